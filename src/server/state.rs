use std::sync::Arc;

use crate::compare::ComparisonOrchestrator;
use crate::context::RetrievalContext;

/// 应用状态
pub struct AppState {
    /// 对比调度器，内部共享只读的检索上下文
    pub orchestrator: ComparisonOrchestrator,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(ctx: RetrievalContext) -> Arc<Self> {
        Arc::new(AppState { orchestrator: ComparisonOrchestrator::new(Arc::new(ctx)) })
    }
}
