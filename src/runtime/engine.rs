use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::actions::ChatSession;
use crate::compiler::template::{format, format_or_raw};
use crate::dsl::{StepScript, StepDefinition};
use crate::error::{StepExecutionError, StepPhase};
use crate::extract::{self, GeneratedArticle};
use crate::runtime::channel::CallChannel;
use crate::runtime::context::RunContext;
use crate::runtime::observer::{RunObserver, draft_label};
use crate::runtime::transcript::Transcript;

/// 解释器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Init,
    RunningStep(usize),
    Draft,
    Refine,
    Completed,
    Aborted,
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub article: GeneratedArticle,
    /// `Completed`, or `Aborted` when the initial step failed
    pub state: RunState,
    /// 中途失败时记录的错误
    pub aborted: Option<StepExecutionError>,
    pub calls: usize,
    pub transcript: Transcript,
}

pub struct StepInterpreter<'a> {
    channel: &'a CallChannel,
    transitions: Vec<RunState>,
    calls: usize,
}

impl<'a> StepInterpreter<'a> {
    pub fn new(channel: &'a CallChannel) -> Self {
        Self {
            channel,
            transitions: vec![RunState::Init],
            calls: 0,
        }
    }

    /// Every state the interpreter passed through, in order.
    pub fn transitions(&self) -> &[RunState] {
        &self.transitions
    }

    fn enter(&mut self, state: RunState) {
        debug!(?state, "Interpreter transition");
        self.transitions.push(state);
    }

    async fn call(
        &mut self,
        session: &mut dyn ChatSession,
        step: &str,
        phase: StepPhase,
        prompt: &str,
    ) -> Result<String, StepExecutionError> {
        self.calls += 1;
        self.channel.send(session, prompt).await.map_err(|source| StepExecutionError {
            step: step.to_string(),
            phase,
            source,
        })
    }

    pub async fn run(
        &mut self,
        script: &StepScript,
        ctx: &RunContext,
        session: &mut dyn ChatSession,
        observer: &mut dyn RunObserver,
    ) -> RunReport {
        let mut transcript = Transcript::new();

        // 1. Initial
        let (initial_prompt, err) = format_or_raw(&script.initial, &ctx.initial_fields());
        if let Some(e) = err {
            warn!(run_id = %ctx.run_id, "Prompt format error {}. Using raw prompt.", e);
        }

        self.enter(RunState::RunningStep(0));
        info!(run_id = %ctx.run_id, main_kw = %ctx.main_keyword, "STEP 1: Initializing");
        observer.on_progress("STEP 1: Planning (Gemini)").await;

        match self.call(session, "Initial", StepPhase::Initial, &initial_prompt).await {
            Ok(response) => transcript.record_exchange(None, &initial_prompt, &response),
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Initial prompt failed");
                self.enter(RunState::Aborted);
                return RunReport {
                    run_id: ctx.run_id,
                    article: GeneratedArticle::empty(),
                    state: RunState::Aborted,
                    aborted: Some(e),
                    calls: self.calls,
                    transcript,
                };
            }
        }

        // 2. Steps
        let mut aborted = None;
        for (index, (step, definition)) in script.steps.iter().enumerate() {
            self.enter(RunState::RunningStep(index + 1));
            info!(run_id = %ctx.run_id, step = %step, "Proceeding to step");

            if let Err(e) = self.run_step(step, definition, ctx, session, observer, &mut transcript).await {
                error!(run_id = %ctx.run_id, step = %step, error = ?e, "Error at step, aborting remaining steps");
                self.enter(RunState::Aborted);
                aborted = Some(e);
                break;
            }
        }

        // 3. Extract whatever the transcript holds
        self.enter(RunState::Completed);
        let article = extract::extract(&transcript.render());

        RunReport {
            run_id: ctx.run_id,
            article,
            state: RunState::Completed,
            aborted,
            calls: self.calls,
            transcript,
        }
    }

    async fn run_step(
        &mut self,
        step: &str,
        definition: &StepDefinition,
        ctx: &RunContext,
        session: &mut dyn ChatSession,
        observer: &mut dyn RunObserver,
        transcript: &mut Transcript,
    ) -> Result<(), StepExecutionError> {
        let fields = ctx.step_fields();
        // A format error in either half sends both halves raw.
        let formatted = format(&definition.exec, &fields)
            .and_then(|exec| format(&definition.check, &fields).map(|check| (exec, check)));
        let (exec, check) = match formatted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(step = %step, "Format Error: {}. Using raw text.", e);
                (definition.exec.clone(), definition.check.clone())
            }
        };

        // Draft
        self.enter(RunState::Draft);
        observer.on_progress(&format!("{} 実行中 (Draft)...", step)).await;
        let draft_prompt = draft_prompt(step, &exec);
        let draft = self.call(session, step, StepPhase::Draft, &draft_prompt).await?;
        transcript.record_exchange(Some(format!("{} - Draft", step)), &draft_prompt, &draft);
        observer.on_step_result(&draft_label(step), &draft).await;

        let mut final_text = draft;

        // Refine
        if definition.has_check() {
            self.enter(RunState::Refine);
            observer.on_progress(&format!("{} 自己チェック中 (Refine)...", step)).await;
            let refine_prompt = refine_prompt(&check);
            let refined = self.call(session, step, StepPhase::Refine, &refine_prompt).await?;
            transcript.record_exchange(Some(format!("{} - Refine", step)), &refine_prompt, &refined);
            final_text = refined;
        }

        observer.on_step_result(step, &final_text).await;
        Ok(())
    }
}

pub fn draft_prompt(step: &str, exec: &str) -> String {
    format!(
        "\n次の {} を実行してください。\n\n{}\n\n出力をお願いします。\n",
        step, exec
    )
}

pub fn refine_prompt(check: &str) -> String {
    format!(
        "\nありがとうございます。\n\
         直前の出力結果に対して、以下の【自己チェック基準】を用いて厳密にチェックし、\n\
         問題がある場合は修正した【最終結果】を出力してください。\n\
         問題がない場合も、そのまま出力してください。\n\n\
         **【自己チェック基準】**\n{}\n\n\
         出力は修正後のコンテンツのみをお願いします。\n",
        check
    )
}
