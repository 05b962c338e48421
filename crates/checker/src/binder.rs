//! 규칙의 이름 구조를 평가 대상 데이터 묶음([`HandleData`])으로 바인딩합니다.
//!
//! 이름 구조는 쉼표로 여러 개를 지정할 수 있으며, 이 경우 각 이름 구조의
//! 데이터 목록의 곱집합마다 하나의 [`HandleData`]가 만들어집니다.

use std::sync::Arc;

use crate::error::CheckerError;
use crate::expr::Value;
use crate::rule::PERFORMANCE_DASHBOARD;
use crate::source::{NodeConfig, SourceData, config_name_struct};
use crate::value::ConfigValue;

/// 노드 설정이 바인딩되는 이름
pub const CONFIG_BINDING: &str = "config";
/// 대시보드 데이터가 바인딩되는 이름
pub const DASHBOARD_BINDING: &str = "dashboard";

/// 바인딩된 데이터 하나
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// 노드 설정
    Node(NodeConfig),
    /// 성능 대시보드
    Dashboard(Arc<ConfigValue>),
}

impl Datum {
    /// 데이터의 식별 태그
    pub fn uqi_tag(&self) -> String {
        match self {
            Datum::Node(node) => node.uqi_tag(),
            Datum::Dashboard(_) => PERFORMANCE_DASHBOARD.to_owned(),
        }
    }

    /// 규칙에서 참조하는 이름 (`config`, `dashboard`)
    pub fn binding_name(&self) -> &'static str {
        match self {
            Datum::Node(_) => CONFIG_BINDING,
            Datum::Dashboard(_) => DASHBOARD_BINDING,
        }
    }

    /// 원래 이름 구조 (`TidbConfig`, `performance.dashboard`)
    pub fn name_struct(&self) -> &'static str {
        match self {
            Datum::Node(node) => config_name_struct(node.component),
            Datum::Dashboard(_) => PERFORMANCE_DASHBOARD,
        }
    }

    /// 값 트리 (설정이 없으면 `None`)
    pub fn tree(&self) -> Option<&Arc<ConfigValue>> {
        match self {
            Datum::Node(node) => node.config.as_ref(),
            Datum::Dashboard(tree) => Some(tree),
        }
    }

    /// 규칙 평가 값
    pub fn value(&self) -> Value {
        self.tree().map_or(Value::Nil, |t| Value::Tree(Arc::clone(t)))
    }

    fn is_valid(&self) -> bool {
        self.tree().is_some()
    }
}

/// 규칙 평가 단위 데이터
#[derive(Debug, Clone, PartialEq)]
pub struct HandleData {
    /// 평가 단위 식별자 (데이터가 여럿이면 `,`로 연결)
    pub uqi_tag: String,
    pub data: Vec<Datum>,
    /// 모든 데이터가 로딩되었는지 여부
    pub is_valid: bool,
}

impl HandleData {
    /// 데이터 묶음으로 생성합니다.
    pub fn new(data: Vec<Datum>) -> Self {
        let uqi_tag = data
            .iter()
            .map(Datum::uqi_tag)
            .collect::<Vec<_>>()
            .join(",");
        let is_valid = data.iter().all(Datum::is_valid);
        Self {
            uqi_tag,
            data,
            is_valid,
        }
    }

    /// 대시보드 데이터
    pub fn dashboard(&self) -> Option<&Arc<ConfigValue>> {
        self.data.iter().find_map(|d| match d {
            Datum::Dashboard(tree) => Some(tree),
            Datum::Node(_) => None,
        })
    }
}

/// 소스 데이터에 대한 바인더
#[derive(Debug, Clone, Copy)]
pub struct Binder<'a> {
    source: &'a SourceData,
}

impl<'a> Binder<'a> {
    pub fn new(source: &'a SourceData) -> Self {
        Self { source }
    }

    /// 이름 구조에 해당하는 평가 단위 데이터 목록
    pub fn bind(&self, name_structs: &str) -> Result<Vec<HandleData>, CheckerError> {
        let mut groups = Vec::new();
        for name_struct in name_structs.split(',').map(str::trim) {
            groups.push(self.find(name_struct)?);
        }
        Ok(cross(&groups).into_iter().map(HandleData::new).collect())
    }

    fn find(&self, name_struct: &str) -> Result<Vec<Datum>, CheckerError> {
        if name_struct.ends_with("Config") {
            let nodes = self
                .source
                .nodes(name_struct)
                .ok_or_else(|| CheckerError::NameStruct(name_struct.to_owned()))?;
            Ok(nodes.iter().cloned().map(Datum::Node).collect())
        } else if name_struct == PERFORMANCE_DASHBOARD {
            let dashboard = self
                .source
                .dashboard_data
                .as_ref()
                .ok_or_else(|| CheckerError::NameStruct(name_struct.to_owned()))?;
            Ok(vec![Datum::Dashboard(Arc::clone(dashboard))])
        } else {
            Err(CheckerError::NameStruct(name_struct.to_owned()))
        }
    }
}

/// 그룹별로 하나씩 고른 모든 조합
fn cross(groups: &[Vec<Datum>]) -> Vec<Vec<Datum>> {
    groups.iter().fold(vec![Vec::new()], |acc, group| {
        acc.iter()
            .flat_map(|prefix| {
                group.iter().map(move |datum| {
                    let mut row = prefix.clone();
                    row.push(datum.clone());
                    row
                })
            })
            .collect()
    })
}
