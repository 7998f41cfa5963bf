use super::{prim, Abstract, Node, NodeClass, NodeId, NodeKind, Primitive, Value};
use crate::{
    device::{AddressId, DeviceAddress},
    kernel::SymbolEngine,
};
use std::{collections::BTreeMap, sync::Arc};

/// 节点的某个输出，或某个节点的某个输入。
pub type KernelWithIndex = (NodeId, usize);

#[derive(Clone, Copy, Default, Debug)]
pub struct GraphFlags {
    /// 由单算子执行构造。
    pub from_single_op: bool,
    /// PyNative 模式的反向图。
    pub pynative_bprop: bool,
    /// 整图下沉执行，节点没有核模块。
    pub graph_run_mode: bool,
    /// 内存由图引擎管理，运行时不维护别名表。
    pub ge_managed: bool,
}

/// 核图。
///
/// 节点和设备地址都存放在图内的池中，通过编号引用。
pub struct KernelGraph {
    graph_id: u32,
    device_target: String,
    nodes: Vec<Node>,
    parameters: Vec<NodeId>,
    ret: Option<NodeId>,
    execution_order: Vec<NodeId>,
    ref_out_in_map: BTreeMap<KernelWithIndex, KernelWithIndex>,
    addresses: Vec<DeviceAddress>,
    flags: GraphFlags,
    symbol_engine: Option<Arc<dyn SymbolEngine>>,
}

impl KernelGraph {
    pub fn new(graph_id: u32, device_target: impl Into<String>) -> Self {
        Self {
            graph_id,
            device_target: device_target.into(),
            nodes: vec![],
            parameters: vec![],
            ret: None,
            execution_order: vec![],
            ref_out_in_map: BTreeMap::new(),
            addresses: vec![],
            flags: GraphFlags::default(),
            symbol_engine: None,
        }
    }

    fn push(&mut self, kind: NodeKind, abstract_: Option<Abstract>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let class = NodeClass::classify(&kind);
        self.nodes.push(Node {
            id,
            kind,
            class,
            abstract_: abstract_.map(Arc::new),
            kernel_info: None,
            device_target: None,
        });
        id
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, abs: Abstract) -> NodeId {
        let id = self.push(NodeKind::Parameter { name: name.into() }, Some(abs));
        self.parameters.push(id);
        id
    }

    /// 添加值节点，抽象由值推导。
    pub fn add_value_node(&mut self, value: Value) -> NodeId {
        let abs = value.to_abstract();
        self.push(NodeKind::Value(value), Some(abs))
    }

    pub fn add_cnode(
        &mut self,
        prim: Primitive,
        inputs: Vec<NodeId>,
        abs: Option<Abstract>,
    ) -> NodeId {
        self.push(NodeKind::CNode { prim, inputs }, abs)
    }

    /// 设置图的输出。返回节点只创建一次，之后替换它的输入。
    pub fn set_output(&mut self, output: NodeId) -> NodeId {
        let abs = self.node(output).abstract_().cloned();
        match self.ret {
            Some(ret) => {
                self.set_input(ret, 0, output);
                self.node_mut(ret).abstract_ = abs;
                ret
            }
            None => {
                let ret = self.add_cnode(Primitive::new(prim::RETURN), vec![output], None);
                self.node_mut(ret).abstract_ = abs;
                self.ret = Some(ret);
                ret
            }
        }
    }

    #[inline]
    pub fn return_node(&self) -> Option<NodeId> {
        self.ret
    }

    /// 图的输出节点，即返回节点的输入。
    #[inline]
    pub fn output(&self) -> Option<NodeId> {
        self.ret.and_then(|ret| self.node(ret).input(0))
    }

    #[inline]
    pub fn graph_id(&self) -> u32 {
        self.graph_id
    }

    #[inline]
    pub fn device_target(&self) -> &str {
        &self.device_target
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    #[inline]
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// 替换计算节点的第 `i` 个输入。
    pub fn set_input(&mut self, node: NodeId, i: usize, input: NodeId) -> bool {
        match &mut self.node_mut(node).kind {
            NodeKind::CNode { inputs, .. } if i < inputs.len() => {
                inputs[i] = input;
                true
            }
            _ => false,
        }
    }

    /// 替换节点的抽象，旧抽象的持有者不受影响。
    #[inline]
    pub fn set_abstract(&mut self, node: NodeId, abs: Abstract) {
        self.node_mut(node).abstract_ = Some(Arc::new(abs))
    }

    /// 使用节点的所有计算节点及输入位置。
    pub fn users(&self, node: NodeId) -> Vec<KernelWithIndex> {
        self.nodes
            .iter()
            .flat_map(|user| {
                user.inputs()
                    .iter()
                    .enumerate()
                    .filter(move |&(_, &input)| input == node)
                    .map(move |(i, _)| (user.id, i))
            })
            .collect()
    }

    #[inline]
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    #[inline]
    pub fn set_execution_order(&mut self, order: Vec<NodeId>) {
        self.execution_order = order
    }

    #[inline]
    pub fn ref_out_in_map(&self) -> &BTreeMap<KernelWithIndex, KernelWithIndex> {
        &self.ref_out_in_map
    }

    #[inline]
    pub fn set_ref_out_in_map(&mut self, map: BTreeMap<KernelWithIndex, KernelWithIndex>) {
        self.ref_out_in_map = map
    }

    #[inline]
    pub fn is_in_ref_out_map(&self, out: KernelWithIndex) -> bool {
        self.ref_out_in_map.contains_key(&out)
    }

    /// 记录输出对输入的别名。
    #[inline]
    pub fn add_ref_correspond_pairs(&mut self, out: KernelWithIndex, origin: KernelWithIndex) {
        self.ref_out_in_map.insert(out, origin);
    }

    /// 向地址池添加设备地址。
    pub fn add_address(&mut self, address: DeviceAddress) -> AddressId {
        let id = AddressId::new(self.addresses.len());
        self.addresses.push(address);
        id
    }

    #[inline]
    pub fn address(&self, id: AddressId) -> &DeviceAddress {
        &self.addresses[id.index()]
    }

    #[inline]
    pub fn address_mut(&mut self, id: AddressId) -> &mut DeviceAddress {
        &mut self.addresses[id.index()]
    }

    #[inline]
    pub fn flags(&self) -> GraphFlags {
        self.flags
    }

    #[inline]
    pub fn flags_mut(&mut self) -> &mut GraphFlags {
        &mut self.flags
    }

    #[inline]
    pub fn symbol_engine(&self) -> Option<&Arc<dyn SymbolEngine>> {
        self.symbol_engine.as_ref()
    }

    #[inline]
    pub fn set_symbol_engine(&mut self, engine: Arc<dyn SymbolEngine>) {
        self.symbol_engine = Some(engine)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ::common::TypeId;

    #[test]
    fn test_build_graph() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let one = g.add_value_node(Value::Int(1));
        let add = g.add_cnode(
            Primitive::new("Add"),
            vec![x, one],
            Some(Abstract::tensor(TypeId::Float32, [2])),
        );
        let ret = g.set_output(add);

        assert_eq!(g.parameters(), &[x]);
        assert_eq!(g.return_node(), Some(ret));
        assert_eq!(g.output(), Some(add));
        assert_eq!(g.users(x), vec![(add, 0)]);
        assert_eq!(g.node(ret).class(), NodeClass::Virtual(super::super::VirtualOp::Return));

        assert!(g.set_input(add, 1, x));
        assert!(!g.set_input(add, 2, x));
        assert_eq!(g.users(x), vec![(add, 0), (add, 1)]);
    }
}
