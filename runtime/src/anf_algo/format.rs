use super::{
    build_info, get_output_element_num, get_prev_node_output, get_output_tensor_num,
    input_tensor_num, is_dynamic_sequence, is_real_kernel, node_name, require_real_kernel,
};
use crate::{
    device::{format, KernelObjectType},
    index_out_of_range, invalid_format,
    ir::{attr, KernelGraph, NodeId},
    FatalError,
};

/// 真实核所有输出的格式。
pub fn get_all_output_formats(graph: &KernelGraph, node: NodeId) -> Result<Vec<String>, FatalError> {
    require_real_kernel(graph, node)?;
    Ok(build_info(graph, node)?.all_output_formats().to_vec())
}

/// 真实核所有输入的格式。
pub fn get_all_input_formats(graph: &KernelGraph, node: NodeId) -> Result<Vec<String>, FatalError> {
    require_real_kernel(graph, node)?;
    Ok(build_info(graph, node)?.all_input_formats().to_vec())
}

/// 选核前的原始数据格式，尚未选核时为默认格式。
pub fn get_origin_data_format(graph: &KernelGraph, node: NodeId) -> Result<String, FatalError> {
    require_real_kernel(graph, node)?;
    Ok(graph
        .node(node)
        .kernel_info()
        .and_then(|info| info.build_info())
        .map_or(format::DEFAULT, |build| build.origin_data_format())
        .into())
}

/// 输出格式。虚拟节点返回数据来源的格式。
///
/// 序号允许等于输出元素个数。
pub fn get_output_format(graph: &KernelGraph, node: NodeId, index: usize) -> Result<String, FatalError> {
    let num = get_output_element_num(graph, node);
    if index > num && !is_dynamic_sequence(graph, node) {
        return Err(index_out_of_range(format!("output {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if graph
        .node(node)
        .abstract_()
        .is_some_and(|abs| abs.is_sparse())
    {
        return Ok(format::DEFAULT.into());
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_format(graph, node, index);
    }
    let build = build_info(graph, node)?;
    let index = match build.output_kernel_object_types().first() {
        Some(KernelObjectType::Tuple) => 0,
        _ => index,
    };
    match build.output_format(index) {
        format::INVALID => Err(invalid_format(format!("output {index} has invalid format"))
            .at(node_name(graph, node))),
        f => Ok(f.into()),
    }
}

/// 输入格式。虚拟节点返回数据来源的格式。
pub fn get_input_format(graph: &KernelGraph, node: NodeId, index: usize) -> Result<String, FatalError> {
    let num = input_tensor_num(graph, node);
    if index > num {
        return Err(index_out_of_range(format!("input {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_format(graph, node, index);
    }
    match build_info(graph, node)?.input_format(index) {
        format::INVALID => Err(invalid_format(format!("input {index} has invalid format"))
            .at(node_name(graph, node))),
        f => Ok(f.into()),
    }
}

/// 第 `i` 个输入来源的输出格式。
pub fn get_prev_node_output_format(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<String, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_format(graph, prev, index)
}

/// 输入的补齐规则。尚未选核时为空。
pub fn get_input_reshape_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<String, FatalError> {
    let num = input_tensor_num(graph, node);
    if index > num {
        return Err(index_out_of_range(format!("input {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_reshape_type(graph, node, index);
    }
    Ok(graph
        .node(node)
        .kernel_info()
        .and_then(|info| info.build_info())
        .map_or("", |build| build.input_reshape_type(index))
        .into())
}

/// 输出的补齐规则。尚未选核时为空。
pub fn get_output_reshape_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<String, FatalError> {
    let num = get_output_tensor_num(graph, node);
    if index > num {
        return Err(index_out_of_range(format!("output {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_reshape_type(graph, node, index);
    }
    Ok(graph
        .node(node)
        .kernel_info()
        .and_then(|info| info.build_info())
        .map_or("", |build| build.output_reshape_type(index))
        .into())
}

pub fn get_prev_node_output_reshape_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<String, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_reshape_type(graph, prev, index)
}

#[inline]
pub fn has_origin_format(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .prim()
        .is_some_and(|prim| prim.has_attr(attr::ORIGIN_FORMAT))
}

/// 原语上记录的原始格式。
pub fn get_origin_format(graph: &KernelGraph, node: NodeId) -> Option<String> {
    graph
        .node(node)
        .prim()?
        .attr(attr::ORIGIN_FORMAT)?
        .as_str()
        .map(Into::into)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        anf_algo::test_util::select,
        device::format::{DEFAULT, FRACTAL_NZ, NC1HWC0, NCHW},
        ir::{Abstract, Primitive, Value},
        FatalErrorKind,
    };
    use ::common::TypeId;

    #[test]
    fn test_pass_through() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float16, [2, 16]));
        select(&mut g, x, &[], &[(FRACTAL_NZ, TypeId::Float16)]);
        let split = g.add_cnode(
            Primitive::new("Split"),
            vec![x],
            Some(Abstract::tuple(vec![Abstract::tensor(TypeId::Float16, [1, 16]); 2])),
        );
        select(
            &mut g,
            split,
            &[(FRACTAL_NZ, TypeId::Float16)],
            &[(NC1HWC0, TypeId::Float16), (NCHW, TypeId::Float16)],
        );
        let one = g.add_value_node(Value::Int(1));
        let item = g.add_cnode(
            Primitive::new("TupleGetItem"),
            vec![split, one],
            Some(Abstract::tensor(TypeId::Float16, [1, 16])),
        );
        let depend = g.add_cnode(
            Primitive::new("Depend"),
            vec![item, x],
            Some(Abstract::tensor(TypeId::Float16, [1, 16])),
        );

        for node in [item, depend] {
            let (prev, index) = get_prev_node_output(&g, node, 0).unwrap();
            assert_eq!(
                get_output_format(&g, node, 0).unwrap(),
                get_output_format(&g, prev, index).unwrap()
            );
        }
        assert_eq!(get_output_format(&g, depend, 0).unwrap(), NCHW);
        assert_eq!(get_input_format(&g, split, 0).unwrap(), FRACTAL_NZ);
        assert_eq!(get_input_format(&g, depend, 1).unwrap(), FRACTAL_NZ);
        assert_eq!(get_all_output_formats(&g, split).unwrap(), [NC1HWC0, NCHW]);
        assert!(get_all_output_formats(&g, item).is_err());
        assert_eq!(get_origin_data_format(&g, split).unwrap(), DEFAULT);
        assert_eq!(get_input_reshape_type(&g, split, 0).unwrap(), "");
    }

    #[test]
    fn test_invalid_format() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float16, [2]));
        let e = get_output_format(&g, x, 0).unwrap_err();
        assert_eq!(e.kind, FatalErrorKind::NullCollaborator);

        select(&mut g, x, &[], &[]);
        let e = get_output_format(&g, x, 0).unwrap_err();
        assert_eq!(e.kind, FatalErrorKind::InvalidFormat);
        // 序号等于输出个数时仍然通过检查
        assert_eq!(
            get_output_format(&g, x, 1).unwrap_err().kind,
            FatalErrorKind::InvalidFormat
        );
        assert_eq!(
            get_output_format(&g, x, 2).unwrap_err().kind,
            FatalErrorKind::IndexOutOfRange
        );
    }

    #[test]
    fn test_origin_format() {
        let mut g = KernelGraph::new(0, "Ascend");
        let conv = g.add_cnode(
            Primitive::new("Conv2D").with_attr(attr::ORIGIN_FORMAT, Value::Str("NHWC".into())),
            vec![],
            None,
        );
        let relu = g.add_cnode(Primitive::new("ReLU"), vec![conv], None);
        assert!(has_origin_format(&g, conv));
        assert_eq!(get_origin_format(&g, conv).as_deref(), Some("NHWC"));
        assert!(!has_origin_format(&g, relu));
        assert_eq!(get_origin_format(&g, relu), None);
    }
}
