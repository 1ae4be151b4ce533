use async_trait::async_trait;

/// 运行观察者接口
/// 解释器通过此接口报告进度与每一步的原始输出
#[async_trait]
pub trait RunObserver: Send {
    /// 进度通知 (step 1 发送前、每个 draft / refine 发送前)
    async fn on_progress(&mut self, text: &str);

    /// 步骤结果：draft 以 "STEP X (Draft)" 上报，最终结果以步骤 ID 上报
    async fn on_step_result(&mut self, step_id: &str, text: &str);
}

#[derive(Debug, Default)]
pub struct NoopObserver;

#[async_trait]
impl RunObserver for NoopObserver {
    async fn on_progress(&mut self, _text: &str) {}
    async fn on_step_result(&mut self, _step_id: &str, _text: &str) {}
}

pub fn draft_label(step_id: &str) -> String {
    format!("{} (Draft)", step_id)
}
