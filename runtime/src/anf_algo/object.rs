use super::{
    build_info, get_input_node, get_output_element_num, input_tensor_num, kernel_info,
    node_abstract, node_name,
};
use crate::{
    device::KernelObjectType,
    index_out_of_range, invalid_node,
    ir::{Abstract, KernelGraph, NodeClass, NodeId, ObjectType, SeqKind, VirtualOp},
    FatalError,
};

/// 抽象对应的对象类型，没有抽象时为 [`ObjectType::Unknown`]。
#[inline]
pub fn get_abstract_object_type(abs: Option<&Abstract>) -> ObjectType {
    abs.map_or(ObjectType::Unknown, Abstract::object_type)
}

/// 第 `index` 个输出的对象类型。元组按元素取，其他抽象只有输出 0。
pub fn get_output_object_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<ObjectType, FatalError> {
    let abs = node_abstract(graph, node)?;
    match abs.as_sequence() {
        Some(seq) if seq.kind == SeqKind::Tuple => seq
            .elements
            .get(index)
            .map(Abstract::object_type)
            .ok_or_else(|| {
                index_out_of_range(format!(
                    "output {index} out of range {}",
                    seq.elements.len()
                ))
                .at(node_name(graph, node))
            }),
        _ if index != 0 => Err(index_out_of_range(format!("output {index} of single output"))
            .at(node_name(graph, node))),
        _ => Ok(abs.object_type()),
    }
}

/// 第 `i` 个输入的对象类型，只穿过 `Depend` 和 `Load`。
pub fn get_input_object_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<ObjectType, FatalError> {
    let mut input = get_input_node(graph, node, i)?;
    while let NodeClass::Virtual(VirtualOp::Depend | VirtualOp::Load) = graph.node(input).class() {
        input = get_input_node(graph, input, 0)?
    }
    Ok(get_abstract_object_type(
        graph.node(input).abstract_().map(|a| &**a),
    ))
}

pub fn get_all_input_object_type(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<Vec<ObjectType>, FatalError> {
    if !graph.node(node).is_cnode() {
        return Err(invalid_node("not a cnode").at(node_name(graph, node)));
    }
    (0..input_tensor_num(graph, node))
        .map(|i| get_input_object_type(graph, node, i))
        .collect()
}

/// 输出整体的对象类型。没有输出的非序列节点返回空。
pub fn get_all_output_object_type(graph: &KernelGraph, node: NodeId) -> Vec<ObjectType> {
    let abs = graph.node(node).abstract_().map(|a| &**a);
    if get_output_element_num(graph, node) == 0 && abs.is_some_and(|abs| abs.as_sequence().is_none()) {
        return vec![];
    }
    vec![get_abstract_object_type(abs)]
}

pub fn get_input_kernel_object_types(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<Vec<KernelObjectType>, FatalError> {
    Ok(build_info(graph, node)?.input_kernel_object_types().to_vec())
}

/// 选核结果中输出的对象类型，尚未选核时为空。
pub fn get_output_kernel_object_types(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<Vec<KernelObjectType>, FatalError> {
    Ok(kernel_info(graph, node)?
        .build_info()
        .map_or_else(Vec::new, |build| build.output_kernel_object_types().to_vec()))
}

pub fn get_input_kernel_object_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<KernelObjectType, FatalError> {
    let types = build_info(graph, node)?.input_kernel_object_types();
    types.get(i).copied().ok_or_else(|| {
        index_out_of_range(format!("input {i} out of range {}", types.len())).at(node_name(graph, node))
    })
}

pub fn get_output_kernel_object_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<KernelObjectType, FatalError> {
    let types = build_info(graph, node)?.output_kernel_object_types();
    types.get(i).copied().ok_or_else(|| {
        index_out_of_range(format!("output {i} out of range {}", types.len())).at(node_name(graph, node))
    })
}

/// 选核结果是否有效。
#[inline]
pub fn get_valid(graph: &KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    Ok(build_info(graph, node)?.valid())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        anf_algo::test_util::select,
        device::format::DEFAULT,
        ir::{MonadKind, Primitive},
        FatalErrorKind,
    };
    use ::common::TypeId;

    #[test]
    fn test_object_type() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let n = g.add_parameter("n", Abstract::scalar(TypeId::Int64));
        let u = g.add_parameter("u", Abstract::Monad(MonadKind::U));
        let tuple = g.add_cnode(
            Primitive::new("MakeTuple"),
            vec![x, n],
            Some(Abstract::tuple(vec![
                Abstract::tensor(TypeId::Float32, [2]),
                Abstract::scalar(TypeId::Int64),
            ])),
        );
        let load = g.add_cnode(
            Primitive::new("Load"),
            vec![x, u],
            Some(Abstract::tensor(TypeId::Float32, [2])),
        );
        let op = g.add_cnode(
            Primitive::new("Custom"),
            vec![tuple, load, n, u],
            Some(Abstract::None),
        );

        assert_eq!(get_output_object_type(&g, tuple, 1).unwrap(), ObjectType::Number);
        assert!(get_output_object_type(&g, tuple, 2).is_err());
        assert!(get_output_object_type(&g, x, 1).is_err());
        assert_eq!(
            get_all_input_object_type(&g, op).unwrap(),
            [ObjectType::Tuple, ObjectType::Tensor, ObjectType::Number]
        );
        assert!(get_all_input_object_type(&g, x).is_err());
        assert_eq!(get_all_output_object_type(&g, tuple), [ObjectType::Tuple]);
        assert!(get_all_output_object_type(&g, op).is_empty());
        assert_eq!(get_abstract_object_type(None), ObjectType::Unknown);
    }

    #[test]
    fn test_kernel_object_type() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        assert_eq!(
            get_output_kernel_object_types(&g, x).unwrap_err().kind,
            FatalErrorKind::NullCollaborator
        );
        select(&mut g, x, &[], &[(DEFAULT, TypeId::Float32)]);
        assert_eq!(
            get_output_kernel_object_types(&g, x).unwrap(),
            [KernelObjectType::Tensor]
        );
        assert_eq!(
            get_output_kernel_object_type(&g, x, 0).unwrap(),
            KernelObjectType::Tensor
        );
        assert!(get_output_kernel_object_type(&g, x, 1).is_err());
        assert!(get_input_kernel_object_types(&g, x).unwrap().is_empty());
        assert!(get_input_kernel_object_type(&g, x, 0).is_err());
        assert!(get_valid(&g, x).unwrap());
    }
}
