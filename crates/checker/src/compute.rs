//! 평가 단위 -- 같은 데이터에 바인딩된 규칙을 한 번에 컴파일하고 실행합니다.

use std::sync::Arc;

use crate::binder::HandleData;
use crate::error::CheckerError;
use crate::expr::{Context, Program, RuleResults};
use crate::rule::Rule;

/// `uqi_tag` 하나에 대한 평가 단위
#[derive(Debug, Clone)]
pub struct ComputeUnit {
    pub handle_data: HandleData,
    pub rules: Vec<Arc<Rule>>,
}

impl ComputeUnit {
    pub fn new(handle_data: HandleData) -> Self {
        Self {
            handle_data,
            rules: Vec::new(),
        }
    }

    /// 규칙을 추가합니다.
    pub fn push(&mut self, rule: Arc<Rule>) {
        self.rules.push(rule);
    }

    /// 모든 규칙 결과가 `None`인 결과
    pub fn empty_results(&self) -> RuleResults {
        self.rules.iter().map(|r| (r.name.clone(), None)).collect()
    }

    /// 규칙 소스를 이어 붙입니다.
    pub fn splice_rules(&self) -> String {
        let mut source = String::new();
        for rule in &self.rules {
            source.push_str(&rule.execute_rule);
            source.push('\n');
        }
        source
    }

    /// 평가 컨텍스트를 만듭니다.
    ///
    /// 각 데이터는 `config`/`dashboard`와 원래 이름 구조 이름으로 함께 바인딩됩니다.
    pub fn context(&self) -> Context {
        let mut ctx = Context::new();
        for datum in &self.handle_data.data {
            ctx.bind(datum.binding_name(), datum.value());
            ctx.bind(datum.name_struct(), datum.value());
        }
        ctx
    }

    /// 규칙을 실행합니다.
    ///
    /// 데이터가 유효하지 않으면 모든 규칙이 `None`입니다.
    /// 결과에는 단위에 선언된 규칙 이름만 남습니다.
    /// 컴파일 에러는 단위 전체의 실패로 반환됩니다.
    pub fn compute(&self) -> Result<RuleResults, CheckerError> {
        if !self.handle_data.is_valid {
            tracing::debug!(uqi_tag = %self.handle_data.uqi_tag, "invalid data, reporting no data");
            return Ok(self.empty_results());
        }

        let program = Program::compile(&self.splice_rules())?;
        let mut executed = program.execute(&self.context());
        Ok(self
            .rules
            .iter()
            .map(|rule| (rule.name.clone(), executed.remove(&rule.name).flatten()))
            .collect())
    }
}
