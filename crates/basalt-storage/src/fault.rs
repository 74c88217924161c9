//! Named crash points for recovery testing.
//!
//! Two mechanisms share the same point names:
//!
//! - The `BASALT_CRASH_POINT` environment variable aborts the whole process
//!   (exit code 2) when execution reaches the named point, for
//!   child-process crash harnesses.
//! - [`PagedStore::arm_crash_point`](crate::PagedStore::arm_crash_point)
//!   arms a one-shot, per-store hook that makes the in-flight operation
//!   return [`BasaltError::FaultInjected`] instead, so in-process tests can
//!   drop the store and reopen it as if the process had died.

use basalt_common::{BasaltError, Result};

/// Reached after the WAL record for a blob store is appended and fsynced.
pub const AFTER_WAL_STORE: &str = "after_wal_store";

/// Reached after the WAL record for a blob delete is appended and fsynced.
pub const AFTER_WAL_DELETE: &str = "after_wal_delete";

/// Reached after chain pages are written but before page 0 is flushed.
pub const BEFORE_META_FLUSH: &str = "before_meta_flush";

/// Environment variable naming the point at which to abort the process.
pub const CRASH_POINT_ENV: &str = "BASALT_CRASH_POINT";

/// Fires the named crash point against an optional armed hook.
///
/// The armed point is consumed on a hit, so a reopened store (or a retried
/// operation) runs to completion.
pub(crate) fn trigger(point: &'static str, armed: &mut Option<String>) -> Result<()> {
    if std::env::var(CRASH_POINT_ENV).map(|v| v == point) == Ok(true) {
        std::process::exit(2);
    }
    if armed.as_deref() == Some(point) {
        armed.take();
        return Err(BasaltError::FaultInjected(point));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_unarmed_is_noop() {
        let mut armed = None;
        assert!(trigger(BEFORE_META_FLUSH, &mut armed).is_ok());
    }

    #[test]
    fn test_trigger_other_point_is_noop() {
        let mut armed = Some(AFTER_WAL_STORE.to_string());
        assert!(trigger(BEFORE_META_FLUSH, &mut armed).is_ok());
        assert_eq!(armed.as_deref(), Some(AFTER_WAL_STORE));
    }

    #[test]
    fn test_trigger_armed_fires_once() {
        let mut armed = Some(BEFORE_META_FLUSH.to_string());

        let err = trigger(BEFORE_META_FLUSH, &mut armed).unwrap_err();
        assert!(matches!(err, BasaltError::FaultInjected(BEFORE_META_FLUSH)));

        // Consumed: the next pass through the same point proceeds.
        assert!(trigger(BEFORE_META_FLUSH, &mut armed).is_ok());
    }
}
