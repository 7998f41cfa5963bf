use super::node_name;
use crate::{
    invalid_node,
    ir::{prim, Abstract, KernelGraph, NodeId, Value},
    FatalError,
};
use log::info;

/// 由序列值节点的元素重新构造元组抽象，返回是否更新。
///
/// 元素只能是张量或标量，张量元素的抽象不携带值。
pub fn update_value_node_shape(graph: &mut KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    let Some(Value::Sequence(items)) = graph.node(node).value() else {
        return Ok(false);
    };
    let mut elements = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Tensor(t) => elements.push(Abstract::tensor(t.dtype(), t.shape())),
            v if v.is_scalar() => elements.push(v.to_abstract()),
            v => {
                return Err(invalid_node(format!("invalid value {v:?} in sequence value node"))
                    .at(node_name(graph, node)))
            }
        }
    }
    graph.set_abstract(node, Abstract::tuple(elements));
    Ok(true)
}

/// 标量值节点作为 `node` 的输入时是否需要转为张量。
///
/// 输出含有标量的节点直接接收标量。
pub fn is_scalar_convert_to_tensor(graph: &KernelGraph, input: NodeId, node: NodeId) -> bool {
    if !graph.node(input).value().is_some_and(Value::is_scalar) {
        return false;
    }
    if graph
        .node(node)
        .abstract_()
        .is_some_and(|abs| abs.contains_scalar_out())
    {
        info!(
            "scalar {} of {} need not convert to tensor",
            node_name(graph, input),
            node_name(graph, node)
        );
        return false;
    }
    true
}

/// 节点输出是否是元素全为非字符串标量的序列。
pub fn is_sequence_output_of_scalar(graph: &KernelGraph, node: NodeId) -> bool {
    let Some(seq) = graph.node(node).abstract_().and_then(|abs| abs.as_sequence()) else {
        return false;
    };
    if seq.dynamic_len {
        return seq.dynamic_element.as_deref().map_or(true, Abstract::is_scalar);
    }
    seq.elements.iter().all(|element| {
        element.is_scalar() && !matches!(element.build_value(), Value::Str(_))
    })
}

#[inline]
pub fn is_summary_node(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .prim()
        .is_some_and(|p| prim::SUMMARY_OPS.contains(&&*p.name))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::{BaseShape, HostTensor, Primitive},
        FatalErrorKind,
    };
    use ::common::TypeId;
    use std::sync::Arc;

    #[test]
    fn test_update_value_node_shape() {
        let mut g = KernelGraph::new(0, "CPU");
        let tensor = Arc::new(HostTensor::from_i32s(&[1, 2, 3]));
        let v = g.add_value_node(Value::Sequence(vec![Value::Tensor(tensor), Value::Int(4)]));
        // 以空序列替换后再重建
        g.set_abstract(v, Abstract::tuple(vec![]));
        assert!(update_value_node_shape(&mut g, v).unwrap());
        let abs = g.node(v).abstract_().unwrap();
        assert_eq!(
            abs.build_shape(),
            BaseShape::Tuple(vec![BaseShape::tensor([3]), BaseShape::NoShape])
        );
        assert_eq!(abs.as_sequence().unwrap().elements[0].build_value(), Value::Any);

        // 既不是张量也不是标量的元素是错误
        let bad = g.add_value_node(Value::Sequence(vec![Value::Int(1), Value::None]));
        let before = g.node(bad).abstract_().cloned();
        let e = update_value_node_shape(&mut g, bad).unwrap_err();
        assert_eq!(e.kind, FatalErrorKind::InvalidNode);
        assert!(e.node.is_some());
        assert_eq!(g.node(bad).abstract_().cloned(), before);
        let nested = g.add_value_node(Value::Sequence(vec![Value::Sequence(vec![])]));
        assert!(update_value_node_shape(&mut g, nested).is_err());

        let scalar = g.add_value_node(Value::Int(1));
        assert!(!update_value_node_shape(&mut g, scalar).unwrap());
    }

    #[test]
    fn test_scalar_inputs() {
        let mut g = KernelGraph::new(0, "CPU");
        let one = g.add_value_node(Value::Int(1));
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let add = g.add_cnode(Primitive::new("Add"), vec![x, one], Some(Abstract::tensor(TypeId::Float32, [2])));
        let scalar_add = g.add_cnode(Primitive::new("ScalarAdd"), vec![one, one], Some(Abstract::scalar(TypeId::Int64)));
        assert!(is_scalar_convert_to_tensor(&g, one, add));
        assert!(!is_scalar_convert_to_tensor(&g, one, scalar_add));
        assert!(!is_scalar_convert_to_tensor(&g, x, add));

        let ints = g.add_cnode(
            Primitive::new("MakeRange"),
            vec![one],
            Some(Abstract::tuple(vec![Abstract::scalar(TypeId::Int64); 2])),
        );
        let names = g.add_value_node(Value::Sequence(vec![Value::Str("a".into())]));
        let mixed = g.add_cnode(
            Primitive::new("Mixed"),
            vec![x],
            Some(Abstract::tuple(vec![Abstract::scalar(TypeId::Int64), Abstract::tensor(TypeId::Float32, [1])])),
        );
        let dynamic = g.add_cnode(Primitive::new("Range"), vec![one], Some(Abstract::dynamic_tuple(None)));
        assert!(is_sequence_output_of_scalar(&g, ints));
        assert!(!is_sequence_output_of_scalar(&g, names));
        assert!(!is_sequence_output_of_scalar(&g, mixed));
        assert!(is_sequence_output_of_scalar(&g, dynamic));
        assert!(!is_sequence_output_of_scalar(&g, x));
    }

    #[test]
    fn test_summary() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let summary = g.add_cnode(Primitive::new(prim::TENSOR_SUMMARY), vec![x], Some(Abstract::None));
        let add = g.add_cnode(Primitive::new("Add"), vec![x, x], None);
        assert!(is_summary_node(&g, summary));
        assert!(!is_summary_node(&g, add));
        assert!(!is_summary_node(&g, x));
    }
}
