use std::sync::Arc;

pub type AppState = Arc<rag_service::AppContext>;
