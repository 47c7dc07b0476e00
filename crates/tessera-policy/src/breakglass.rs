//! Break-glass (emergency access) membership, memoized.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use tessera_contracts::value::SqlValue;
use tessera_core::traits::Database;

const BREAKGLASS_LOOKUP: &str = "SELECT gacl_aro.value \
     FROM gacl_aro, gacl_groups_aro_map, gacl_aro_groups \
     WHERE gacl_aro.id = gacl_groups_aro_map.aro_id \
     AND gacl_groups_aro_map.group_id = gacl_aro_groups.id \
     AND gacl_aro_groups.value = 'breakglass' \
     AND gacl_aro.value = ?";

/// Answers "is this user in the breakglass group?" with one database read
/// per user.
///
/// The last answer is memoized together with the user it belongs to; a
/// different user triggers a fresh lookup. Concurrent callers may both miss
/// and both write; the answers are identical, so last write wins.
pub struct BreakglassCache {
    db: Arc<dyn Database>,
    memo: RwLock<Option<(String, bool)>>,
}

impl BreakglassCache {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            memo: RwLock::new(None),
        }
    }

    /// Whether `user` belongs to the breakglass group. Empty users never do;
    /// a failed lookup counts as "no" and is not memoized.
    pub fn is_breakglass(&self, user: &str) -> bool {
        if user.is_empty() {
            return false;
        }

        if let Ok(memo) = self.memo.read() {
            if let Some((cached_user, answer)) = memo.as_ref() {
                if cached_user == user {
                    return *answer;
                }
            }
        }

        let answer = match self.db.query_row(BREAKGLASS_LOOKUP, &[SqlValue::from(user)]) {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!(user = %user, error = %e, "breakglass lookup failed");
                return false;
            }
        };
        debug!(user = %user, breakglass = answer, "breakglass membership resolved");

        if let Ok(mut memo) = self.memo.write() {
            *memo = Some((user.to_string(), answer));
        }
        answer
    }
}
