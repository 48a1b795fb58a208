use crate::models::AuditKind;
use crate::state::AppState;

/// Best-effort: a failing audit sink is logged and never fails the caller.
pub async fn record_audit(state: &AppState, owner_id: Option<&str>, kind: AuditKind, content: &str) {
    if let Err(e) = state.audit.append(owner_id, kind, content).await {
        tracing::warn!(error = %e, kind = kind.as_str(), "failed to record audit entry");
    }
}
