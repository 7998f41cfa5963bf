use super::{
    build_info, get_output_element_num, get_prev_node_output, input_tensor_num,
    is_dynamic_sequence, is_real_kernel, node_name, require_real_kernel,
};
use crate::{
    device::KernelObjectType,
    index_out_of_range, invalid_device_type,
    ir::{Abstract, KernelGraph, NodeId},
    FatalError,
};
use ::common::TypeId;

/// 稀疏张量展开后第 `index` 个张量的类型。
///
/// CSR 展开为 `indptr, indices, values, shape...`，COO 展开为 `indices, values, shape...`，
/// 除数据张量外都是 int64。
fn sparse_type_id(abs: &Abstract, index: usize) -> TypeId {
    match (abs, index) {
        (Abstract::CsrTensor { dtype, .. }, 2) | (Abstract::CooTensor { dtype, .. }, 1) => *dtype,
        _ => TypeId::Int64,
    }
}

/// 输出的设备数据类型。虚拟节点返回数据来源的类型。
///
/// 构建信息中没有这个槽位时报告 [`InvalidDeviceType`](crate::FatalErrorKind::InvalidDeviceType)，
/// 槽位上声明的 [`TypeId::Unknown`] 原样返回。
pub fn get_output_device_data_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<TypeId, FatalError> {
    let num = get_output_element_num(graph, node);
    if index > num && !is_dynamic_sequence(graph, node) {
        return Err(index_out_of_range(format!("output {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if let Some(abs) = graph.node(node).abstract_().filter(|abs| abs.is_sparse()) {
        return Ok(sparse_type_id(abs, index));
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_device_data_type(graph, node, index);
    }
    let build = build_info(graph, node)?;
    // 整体输出的元组只声明一个类型
    let index = if build.output_num() == 1
        && build.output_kernel_object_type(0) == Some(KernelObjectType::Tuple)
    {
        0
    } else {
        index
    };
    build
        .all_output_device_types()
        .get(index)
        .copied()
        .ok_or_else(|| {
            invalid_device_type(format!("output {index} has no device type")).at(node_name(graph, node))
        })
}

/// 输入的设备数据类型。虚拟节点返回首个输入来源的类型。
pub fn get_input_device_data_type(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<TypeId, FatalError> {
    let num = input_tensor_num(graph, node);
    if index > num {
        return Err(index_out_of_range(format!("input {index} out of range {num}"))
            .at(node_name(graph, node)));
    }
    if !is_real_kernel(graph, node) {
        return get_prev_node_output_device_data_type(graph, node, 0);
    }
    build_info(graph, node)?
        .all_input_device_types()
        .get(index)
        .copied()
        .ok_or_else(|| {
            invalid_device_type(format!("input {index} has no device type")).at(node_name(graph, node))
        })
}

#[inline]
pub fn get_prev_node_output_device_data_type(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<TypeId, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_device_data_type(graph, prev, index)
}

pub fn get_all_input_device_types(graph: &KernelGraph, node: NodeId) -> Result<Vec<TypeId>, FatalError> {
    require_real_kernel(graph, node)?;
    Ok(build_info(graph, node)?.all_input_device_types().to_vec())
}

pub fn get_all_output_device_types(graph: &KernelGraph, node: NodeId) -> Result<Vec<TypeId>, FatalError> {
    require_real_kernel(graph, node)?;
    Ok(build_info(graph, node)?.all_output_device_types().to_vec())
}
