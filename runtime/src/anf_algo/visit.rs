//! 沿虚拟节点找到真实的数据来源，以及按输出序号读取推导结果。

use super::{node_abstract, node_name};
use crate::{
    index_out_of_range, invalid_node,
    device::KernelObjectType,
    ir::{Abstract, BaseShape, KernelGraph, KernelWithIndex, NodeClass, NodeId, Type, VirtualOp},
    FatalError,
};
use ::common::{TypeId, UNKNOWN_DIM};

/// `TupleGetItem` 的输入节点和取出的序号。
pub fn tuple_get_item_args(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<KernelWithIndex, FatalError> {
    let n = graph.node(node);
    let (Some(tuple), Some(index)) = (n.input(0), n.input(1)) else {
        return Err(invalid_node("TupleGetItem needs 2 inputs").at(n.debug_string()));
    };
    match graph.node(index).value().and_then(|v| v.as_int()) {
        Some(i) if i >= 0 => Ok((tuple, i as usize)),
        _ => Err(invalid_node("index of TupleGetItem is not a const int").at(n.debug_string())),
    }
}

/// 找到节点第 `index` 个输出的真实来源。
///
/// 穿过 `TupleGetItem`、`Depend` 和 `Load`，`skip_nop_node` 时也穿过无操作节点。
pub fn visit_kernel_with_return_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
    skip_nop_node: bool,
) -> Result<KernelWithIndex, FatalError> {
    let n = graph.node(node);
    match n.class() {
        NodeClass::Parameter | NodeClass::Value => Ok((node, 0)),
        NodeClass::Virtual(VirtualOp::TupleGetItem) => {
            let (tuple, item) = tuple_get_item_args(graph, node)?;
            let (real, real_index) = visit_kernel_with_return_type(graph, tuple, item, skip_nop_node)?;
            let real_node = graph.node(real);
            if real_node.class() == NodeClass::Virtual(VirtualOp::MakeTuple) {
                let input = real_node.input(real_index).ok_or_else(|| {
                    index_out_of_range(format!("MakeTuple has no input {real_index}"))
                        .at(real_node.debug_string())
                })?;
                visit_kernel_with_return_type(graph, input, 0, skip_nop_node)
            } else {
                Ok((real, real_index))
            }
        }
        NodeClass::Virtual(VirtualOp::Depend | VirtualOp::Load) => {
            let input = n
                .input(0)
                .ok_or_else(|| invalid_node("no real input").at(n.debug_string()))?;
            visit_kernel_with_return_type(graph, input, index, skip_nop_node)
        }
        NodeClass::Nop if skip_nop_node => match n.input(0) {
            Some(input) => visit_kernel_with_return_type(graph, input, 0, skip_nop_node),
            None => Ok((node, index)),
        },
        _ => Ok((node, index)),
    }
}

#[inline]
pub fn visit_kernel(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<KernelWithIndex, FatalError> {
    visit_kernel_with_return_type(graph, node, index, false)
}

/// 节点的第 `i` 个输入节点。
pub fn get_input_node(graph: &KernelGraph, node: NodeId, i: usize) -> Result<NodeId, FatalError> {
    let n = graph.node(node);
    n.input(i).ok_or_else(|| {
        index_out_of_range(format!("input {i} out of range {}", n.inputs().len()))
            .at(n.debug_string())
    })
}

/// 节点第 `i` 个输入的真实来源。
#[inline]
pub fn get_prev_node_output(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<KernelWithIndex, FatalError> {
    get_prev_node_output_skip_nop(graph, node, i, false)
}

pub fn get_prev_node_output_skip_nop(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
    skip_nop_node: bool,
) -> Result<KernelWithIndex, FatalError> {
    let n = graph.node(node);
    if !n.is_cnode() {
        return Err(invalid_node("not a cnode").at(n.debug_string()));
    }
    // TupleGetItem 的输入就是它取出的元素
    if n.class() == NodeClass::Virtual(VirtualOp::TupleGetItem) {
        return visit_kernel_with_return_type(graph, node, 0, skip_nop_node);
    }
    let input = get_input_node(graph, node, i)?;
    visit_kernel_with_return_type(graph, input, 0, skip_nop_node)
}

/// 计算节点的输入个数，不计末尾的副作用输入。
pub fn input_tensor_num(graph: &KernelGraph, node: NodeId) -> usize {
    let inputs = graph.node(node).inputs();
    let monads = inputs
        .iter()
        .rev()
        .take_while(|&&input| {
            graph
                .node(input)
                .abstract_()
                .is_some_and(|abs| abs.is_monad())
        })
        .count();
    inputs.len() - monads
}

#[inline]
pub fn is_dynamic_sequence(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .abstract_()
        .is_some_and(|abs| abs.is_dynamic_sequence())
}

#[inline]
pub fn is_tuple_output(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .abstract_()
        .is_some_and(|abs| abs.as_sequence().is_some())
}

/// 选核结果把输出作为一个整体的序列。
pub fn is_real_squence_output(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .kernel_info()
        .and_then(|info| info.build_info())
        .and_then(|build| build.output_kernel_object_type(0))
        == Some(KernelObjectType::Tuple)
}

/// 抽象展开后的输出个数。动态长度的序列算作一个输出。
pub fn output_num_by_abstract(abs: &Abstract) -> usize {
    match abs.as_sequence() {
        Some(seq) if !seq.dynamic_len => seq.elements.iter().map(output_num_by_abstract).sum(),
        _ => 1,
    }
}

fn fetch_abstract_by_index(abs: &Abstract, mut index: usize) -> Option<&Abstract> {
    match abs.as_sequence() {
        Some(seq) if !seq.dynamic_len => {
            for element in &seq.elements {
                let n = output_num_by_abstract(element);
                if index < n {
                    return fetch_abstract_by_index(element, index);
                }
                index -= n
            }
            None
        }
        _ => (index == 0).then_some(abs),
    }
}

/// 节点第 `index` 个输出的抽象，节点没有抽象时返回 [None]。
///
/// 序列输出优先取第 `index` 个元素，越界时按展开后的序号查找。
pub fn get_node_abstract_by_index(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<Option<&Abstract>, FatalError> {
    let Some(abs) = graph.node(node).abstract_().map(|a| &**a) else {
        return Ok(None);
    };
    let whole = match abs.as_sequence() {
        Some(seq) => seq.dynamic_len || is_real_squence_output(graph, node),
        None => true,
    };
    if whole {
        return if index == 0 {
            Ok(Some(abs))
        } else {
            Err(index_out_of_range(format!("output {index} of single output")).at(node_name(graph, node)))
        };
    }
    if let Some(element) = abs.as_sequence().and_then(|seq| seq.elements.get(index)) {
        return Ok(Some(element));
    }
    fetch_abstract_by_index(abs, index)
        .map(Some)
        .ok_or_else(|| index_out_of_range(format!("output {index}")).at(node_name(graph, node)))
}

/// 节点第 `index` 个输出的形状描述。
pub fn get_output_detail_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<BaseShape, FatalError> {
    let shape = node_abstract(graph, node)?.build_shape();
    match shape {
        BaseShape::Shape(_) if index == 0 => Ok(shape),
        BaseShape::Shape(_) => {
            Err(index_out_of_range(format!("output {index} of tensor")).at(node_name(graph, node)))
        }
        BaseShape::Tuple(_) | BaseShape::List(_) if is_real_squence_output(graph, node) => Ok(shape),
        BaseShape::Tuple(mut elements) | BaseShape::List(mut elements) => {
            if index < elements.len() {
                Ok(elements.swap_remove(index))
            } else {
                Err(index_out_of_range(format!(
                    "output {index} out of range {}",
                    elements.len()
                ))
                .at(node_name(graph, node)))
            }
        }
        BaseShape::DynamicSequence(_) | BaseShape::NoShape => Ok(shape),
    }
}

#[inline]
pub fn get_prev_node_output_detail_shape(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<BaseShape, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_detail_shape(graph, prev, index)
}

/// 把形状描述平铺成形状向量。序列为 `[长度, 首元素形状...]`。
pub(super) fn flatten_shape(shape: &BaseShape) -> Vec<i64> {
    match shape {
        BaseShape::Shape(s) => s.dims.clone(),
        BaseShape::Tuple(elements) | BaseShape::List(elements) => {
            let mut ans = vec![elements.len() as i64];
            if let Some(BaseShape::Shape(first)) = elements.first() {
                ans.extend_from_slice(&first.dims)
            }
            ans
        }
        BaseShape::DynamicSequence(_) => vec![UNKNOWN_DIM],
        BaseShape::NoShape => vec![],
    }
}

/// 推导得到的输出形状。
pub fn get_output_infer_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<Vec<i64>, FatalError> {
    get_output_detail_shape(graph, node, index).map(|shape| flatten_shape(&shape))
}

#[inline]
pub fn get_prev_node_output_infer_shape(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<Vec<i64>, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_infer_shape(graph, prev, index)
}

/// 推导得到的输出形状上界。
pub fn get_output_max_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<Vec<i64>, FatalError> {
    Ok(match get_output_detail_shape(graph, node, index)? {
        BaseShape::Shape(s) => s.max_shape,
        _ => vec![],
    })
}

/// 类型的元素类型，序列取首个元素。
pub(super) fn type_dtype(ty: &Type) -> TypeId {
    match ty {
        Type::Tuple(seq) | Type::List(seq) => {
            let element = if seq.dynamic_len {
                seq.dynamic_element.as_deref()
            } else {
                seq.elements.first()
            };
            element.map_or(TypeId::Unknown, type_dtype)
        }
        _ => ty.element().unwrap_or(TypeId::Unknown),
    }
}

/// 推导得到的输出元素类型。
pub fn get_output_infer_data_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<TypeId, FatalError> {
    Ok(get_node_abstract_by_index(graph, node, index)?
        .map_or(TypeId::Unknown, |abs| type_dtype(&abs.build_type())))
}

#[inline]
pub fn get_prev_node_output_infer_data_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<TypeId, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_infer_data_type(graph, prev, index)
}

/// 所有输出推导得到的元素类型。
pub fn get_all_output_infer_data_types(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<Vec<TypeId>, FatalError> {
    (0..super::get_output_tensor_num(graph, node))
        .map(|i| get_output_infer_data_type(graph, node, i))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{Primitive, Value};

    #[test]
    fn test_visit() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let y = g.add_parameter("y", Abstract::tensor(TypeId::Int32, [3]));
        let tuple = g.add_cnode(
            Primitive::new("MakeTuple"),
            vec![x, y],
            Some(Abstract::tuple(vec![
                Abstract::tensor(TypeId::Float32, [2]),
                Abstract::tensor(TypeId::Int32, [3]),
            ])),
        );
        let one = g.add_value_node(Value::Int(1));
        let item = g.add_cnode(Primitive::new("TupleGetItem"), vec![tuple, one], None);
        let depend = g.add_cnode(Primitive::new("Depend"), vec![item, x], None);

        assert_eq!(visit_kernel(&g, depend, 0).unwrap(), (y, 0));
        assert_eq!(get_prev_node_output(&g, depend, 1).unwrap(), (x, 0));
        assert_eq!(visit_kernel(&g, tuple, 1).unwrap(), (tuple, 1));
        assert!(get_prev_node_output(&g, depend, 2).is_err());

        assert_eq!(get_output_infer_shape(&g, tuple, 1).unwrap(), [3]);
        assert_eq!(get_output_infer_data_type(&g, tuple, 0).unwrap(), TypeId::Float32);
        assert!(get_output_infer_shape(&g, tuple, 2).is_err());
        assert_eq!(get_prev_node_output_infer_shape(&g, item, 0).unwrap(), [3]);
    }

    #[test]
    fn test_nested_abstract() {
        let mut g = KernelGraph::new(0, "CPU");
        let abs = Abstract::tuple(vec![
            Abstract::tuple(vec![
                Abstract::scalar(TypeId::Int64),
                Abstract::tensor(TypeId::Float16, [4]),
            ]),
            Abstract::tensor(TypeId::Bool, [1]),
        ]);
        assert_eq!(output_num_by_abstract(&abs), 3);
        let p = g.add_parameter("p", abs);
        // 序号在元素范围内时直接取元素
        let first = get_node_abstract_by_index(&g, p, 0).unwrap().unwrap();
        assert_eq!(output_num_by_abstract(first), 2);
        let second = get_node_abstract_by_index(&g, p, 1).unwrap().unwrap();
        assert_eq!(second, &Abstract::tensor(TypeId::Bool, [1]));
        // 越界时按展开后的序号
        let third = get_node_abstract_by_index(&g, p, 2).unwrap().unwrap();
        assert_eq!(third, &Abstract::tensor(TypeId::Bool, [1]));
        assert!(get_node_abstract_by_index(&g, p, 3).is_err());

        let flat = g.add_parameter(
            "flat",
            Abstract::tuple(vec![
                Abstract::tuple(vec![Abstract::tensor(TypeId::Int8, [1]); 3]),
                Abstract::tensor(TypeId::Float16, [4]),
            ]),
        );
        let last = get_node_abstract_by_index(&g, flat, 3).unwrap().unwrap();
        assert_eq!(last, &Abstract::tensor(TypeId::Float16, [4]));

        let dynamic = g.add_parameter("d", Abstract::dynamic_tuple(None));
        assert!(is_dynamic_sequence(&g, dynamic));
        assert!(get_node_abstract_by_index(&g, dynamic, 0).unwrap().is_some());
        assert!(get_node_abstract_by_index(&g, dynamic, 1).is_err());
        assert_eq!(get_output_infer_shape(&g, dynamic, 0).unwrap(), [UNKNOWN_DIM]);
    }

    #[test]
    fn test_monad_input() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let u = g.add_parameter("u", Abstract::Monad(crate::ir::MonadKind::U));
        let assign = g.add_cnode(Primitive::new("Assign"), vec![x, x, u], None);
        assert_eq!(input_tensor_num(&g, assign), 2);
    }
}
