use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::clock::Clock;
use crate::store::{
    AppointmentStore, AuditSink, ConversationStore, OwnerStore, PatientStore, SqliteStore,
};

pub struct AppState {
    pub config: AppConfig,
    pub clock: Box<dyn Clock>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub patients: Arc<dyn PatientStore>,
    pub owners: Arc<dyn OwnerStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// Wires every collaborator to the same SQLite store.
    pub fn with_store(store: Arc<SqliteStore>, config: AppConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            appointments: store.clone(),
            patients: store.clone(),
            owners: store.clone(),
            conversations: store.clone(),
            audit: store,
        }
    }
}
