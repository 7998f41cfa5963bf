use super::{prim, Abstract, Value};
use crate::device::KernelInfo;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// 节点在图中的编号。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub(super) usize);

impl NodeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// 原语及其属性。
#[derive(Clone, PartialEq, Debug)]
pub struct Primitive {
    pub name: String,
    pub attrs: BTreeMap<String, Value>,
}

impl Primitive {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    #[inline]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    #[inline]
    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    #[inline]
    pub fn set_attr(&mut self, key: impl Into<String>, value: Value) {
        self.attrs.insert(key.into(), value);
    }
}

pub enum NodeKind {
    CNode {
        prim: Primitive,
        inputs: Vec<NodeId>,
    },
    Parameter {
        name: String,
    },
    Value(Value),
}

/// 只负责组织数据、不对应真实核函数的原语。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VirtualOp {
    TupleGetItem,
    MakeTuple,
    Depend,
    Load,
    UpdateState,
    Return,
}

/// 节点分类，在节点创建时确定一次。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeClass {
    Parameter,
    Value,
    RealKernel,
    /// 输出与输入 0 共享内存的真实核。
    Nop,
    Virtual(VirtualOp),
}

impl NodeClass {
    pub fn classify(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Parameter { .. } => Self::Parameter,
            NodeKind::Value(_) => Self::Value,
            NodeKind::CNode { prim, .. } => match &*prim.name {
                prim::TUPLE_GET_ITEM => Self::Virtual(VirtualOp::TupleGetItem),
                prim::MAKE_TUPLE => Self::Virtual(VirtualOp::MakeTuple),
                prim::DEPEND => Self::Virtual(VirtualOp::Depend),
                prim::LOAD => Self::Virtual(VirtualOp::Load),
                prim::UPDATE_STATE => Self::Virtual(VirtualOp::UpdateState),
                prim::RETURN => Self::Virtual(VirtualOp::Return),
                name if prim::NOP_OPS.contains(&name) => Self::Nop,
                _ => Self::RealKernel,
            },
        }
    }

    /// 非计算节点和计算节点中的真实核都视为真实核。
    #[inline]
    pub const fn is_real_kernel(self) -> bool {
        !matches!(self, Self::Virtual(_))
    }

    #[inline]
    pub const fn is_nop(self) -> bool {
        matches!(self, Self::Nop)
    }
}

/// 图节点。
pub struct Node {
    pub(super) id: NodeId,
    pub(super) kind: NodeKind,
    pub(super) class: NodeClass,
    pub(super) abstract_: Option<Arc<Abstract>>,
    pub(super) kernel_info: Option<KernelInfo>,
    pub(super) device_target: Option<String>,
}

impl Node {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn class(&self) -> NodeClass {
        self.class
    }

    #[inline]
    pub fn is_cnode(&self) -> bool {
        matches!(self.kind, NodeKind::CNode { .. })
    }

    #[inline]
    pub fn is_value_node(&self) -> bool {
        matches!(self.kind, NodeKind::Value(_))
    }

    #[inline]
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter { .. })
    }

    #[inline]
    pub fn prim(&self) -> Option<&Primitive> {
        match &self.kind {
            NodeKind::CNode { prim, .. } => Some(prim),
            _ => None,
        }
    }

    #[inline]
    pub fn prim_mut(&mut self) -> Option<&mut Primitive> {
        match &mut self.kind {
            NodeKind::CNode { prim, .. } => Some(prim),
            _ => None,
        }
    }

    /// 是否为指定原语的计算节点。
    #[inline]
    pub fn is_prim(&self, name: &str) -> bool {
        self.prim().is_some_and(|p| p.name == name)
    }

    #[inline]
    pub fn inputs(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::CNode { inputs, .. } => inputs,
            _ => &[],
        }
    }

    #[inline]
    pub fn input(&self, i: usize) -> Option<NodeId> {
        self.inputs().get(i).copied()
    }

    #[inline]
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Value(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn abstract_(&self) -> Option<&Arc<Abstract>> {
        self.abstract_.as_ref()
    }

    #[inline]
    pub fn kernel_info(&self) -> Option<&KernelInfo> {
        self.kernel_info.as_ref()
    }

    #[inline]
    pub fn kernel_info_mut(&mut self) -> Option<&mut KernelInfo> {
        self.kernel_info.as_mut()
    }

    /// 获取核信息，不存在时创建。
    #[inline]
    pub fn kernel_info_or_default(&mut self) -> &mut KernelInfo {
        self.kernel_info.get_or_insert_with(KernelInfo::default)
    }

    /// 节点上记录的执行设备。
    #[inline]
    pub fn device_target(&self) -> Option<&str> {
        self.device_target.as_deref()
    }

    #[inline]
    pub fn set_device_target(&mut self, target: impl Into<String>) {
        self.device_target = Some(target.into())
    }

    pub fn debug_string(&self) -> String {
        match &self.kind {
            NodeKind::CNode { prim, inputs } => {
                let inputs = inputs.iter().map(|i| i.to_string()).collect::<Vec<_>>();
                format!("{}-op{}({})", prim.name, self.id.0, inputs.join(", "))
            }
            NodeKind::Parameter { name } => format!("Parameter({name})"),
            NodeKind::Value(v) => format!("ValueNode{}({v:?})", self.id),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.debug_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify() {
        let cnode = |name: &str| NodeKind::CNode {
            prim: Primitive::new(name),
            inputs: vec![],
        };
        assert_eq!(
            NodeClass::classify(&cnode(prim::TUPLE_GET_ITEM)),
            NodeClass::Virtual(VirtualOp::TupleGetItem)
        );
        assert_eq!(NodeClass::classify(&cnode(prim::RESHAPE)), NodeClass::Nop);
        assert_eq!(NodeClass::classify(&cnode("Add")), NodeClass::RealKernel);
        assert!(NodeClass::classify(&NodeKind::Value(Value::Int(1))).is_real_kernel());
        assert!(!NodeClass::Virtual(VirtualOp::Depend).is_real_kernel());
        assert!(NodeClass::Nop.is_real_kernel());
    }
}
