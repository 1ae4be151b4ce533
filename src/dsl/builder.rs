use crate::dsl::{StepScript, StepDefinition, OutputMapping, ColumnTarget};

pub struct StepScriptBuilder {
    initial: String,
    steps: Vec<(String, StepDefinition)>,
    mappings: OutputMapping,
}

impl StepScriptBuilder {
    pub fn new(initial: &str) -> Self {
        Self {
            initial: initial.to_string(),
            steps: Vec::new(),
            mappings: OutputMapping::new(),
        }
    }

    pub fn step(self, id: &str) -> StepBuilder {
        StepBuilder {
            script_builder: self,
            id: id.to_string(),
            exec: String::new(),
            check: String::new(),
        }
    }

    /// 添加旧格式 (单段文本) 步骤
    pub fn legacy_step(mut self, id: &str, blob: &str) -> Self {
        self.steps.push((id.to_string(), StepDefinition::from_legacy(blob)));
        self
    }

    pub fn map_output(mut self, step: &str, col: usize) -> Self {
        self.mappings.insert(step.to_string(), ColumnTarget { col });
        self
    }

    pub fn build(self) -> StepScript {
        StepScript {
            initial: self.initial,
            steps: self.steps,
            mappings: self.mappings,
        }
    }
}

pub struct StepBuilder {
    script_builder: StepScriptBuilder,
    id: String,
    exec: String,
    check: String,
}

impl StepBuilder {
    pub fn exec(mut self, text: &str) -> Self {
        self.exec = text.to_string();
        self
    }

    pub fn check(mut self, text: &str) -> Self {
        self.check = text.to_string();
        self
    }

    pub fn build(mut self) -> StepScriptBuilder {
        self.script_builder.steps.push((
            self.id,
            StepDefinition {
                exec: self.exec,
                check: self.check,
            },
        ));
        self.script_builder
    }
}
