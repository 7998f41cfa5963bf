use crate::ir::{Abstract, NodeId, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::RwLock,
};

/// 符号形状引擎。
///
/// 核包通过它得知哪些输入的值需要在重算时查询，以及查询到的具体值。
pub trait SymbolEngine {
    /// 节点的输出值由符号推导给出。
    fn is_depend_value(&self, node: NodeId) -> bool;
    /// 查询节点输出的具体值，未知时返回 [None] 或 [`Value::Any`]。
    fn query_value(&self, node: NodeId, abs: &Abstract) -> Option<Value>;
}

/// 以表格记录的符号引擎。
///
/// 执行器在上游节点执行后写入值，核包在重算时读出。
#[derive(Default, Debug)]
pub struct SymbolTable {
    depend: BTreeSet<NodeId>,
    values: RwLock<BTreeMap<NodeId, Value>>,
}

impl SymbolTable {
    /// 标记节点的值需要查询。
    #[inline]
    pub fn mark_depend_value(mut self, node: NodeId) -> Self {
        self.depend.insert(node);
        self
    }

    pub fn set_value(&self, node: NodeId, value: Value) {
        self.values.write().unwrap().insert(node, value);
    }

    pub fn clear_value(&self, node: NodeId) {
        self.values.write().unwrap().remove(&node);
    }
}

impl SymbolEngine for SymbolTable {
    #[inline]
    fn is_depend_value(&self, node: NodeId) -> bool {
        self.depend.contains(&node)
    }

    fn query_value(&self, node: NodeId, _abs: &Abstract) -> Option<Value> {
        self.values.read().unwrap().get(&node).cloned()
    }
}
