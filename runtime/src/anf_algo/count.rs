use super::{
    build_info, get_output_device_data_type, get_output_device_shape, get_output_format,
    get_output_infer_data_type, get_output_max_shape, get_output_reshape_type, node_name,
    output_num_by_abstract,
};
use crate::{
    device::{format, trans},
    index_out_of_range, invalid_node, invalid_shape,
    ir::{Abstract, KernelGraph, NodeClass, NodeId, Type, VirtualOp},
    FatalError,
};
use ::common::{is_dynamic_shape, static_count};

/// 稀疏张量展开后的张量个数。
const CSR_TENSOR_NUM: usize = 5;
const COO_TENSOR_NUM: usize = 4;

/// 节点的输出张量个数。
///
/// 序列输出在选核之前按 1 个计，选核之后以构建信息为准。
pub fn get_output_tensor_num(graph: &KernelGraph, node: NodeId) -> usize {
    let n = graph.node(node);
    let Some(abs) = n.abstract_() else {
        return 0;
    };
    match abs.build_type() {
        Type::Tuple(_) | Type::List(_) => n
            .kernel_info()
            .and_then(|info| info.build_info())
            .map_or(1, |build| build.output_num()),
        Type::None | Type::Monad(_) => 0,
        Type::CsrTensor(_) => CSR_TENSOR_NUM,
        Type::CooTensor(_) => COO_TENSOR_NUM,
        _ => 1,
    }
}

/// 还没有核信息的节点的输出个数，由抽象推出。
pub fn get_output_num_without_kernel_info(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<usize, FatalError> {
    let n = graph.node(node);
    if n.kernel_info().is_some() {
        return Err(invalid_node("node already has kernel info").at(n.debug_string()));
    }
    let Some(abs) = n.abstract_() else {
        return Ok(0);
    };
    Ok(match abs.build_type() {
        Type::Tuple(_) | Type::List(_) => 1,
        Type::None | Type::Monad(_) => 0,
        Type::CsrTensor(_) => CSR_TENSOR_NUM,
        Type::CooTensor(_) => COO_TENSOR_NUM,
        _ => 1,
    })
}

/// 序列本身或任一层元素是动态长度序列。
fn has_dynamic_sequence(abs: &Abstract) -> bool {
    abs.as_sequence()
        .is_some_and(|seq| seq.dynamic_len || seq.elements.iter().any(has_dynamic_sequence))
}

/// 输出元素个数，含动态长度序列的输出按抽象计数。
pub fn get_output_element_num(graph: &KernelGraph, node: NodeId) -> usize {
    match graph.node(node).abstract_() {
        Some(abs) if has_dynamic_sequence(abs) => output_num_by_abstract(abs),
        _ => get_output_tensor_num(graph, node),
    }
}

/// 输入展开后的元素个数，`MakeTuple` 输入递归展开。
pub fn get_input_element_num(graph: &KernelGraph, node: NodeId) -> Result<usize, FatalError> {
    let n = graph.node(node);
    if !n.is_cnode() {
        return Err(invalid_node("not a cnode").at(n.debug_string()));
    }
    let mut ans = 0;
    let mut skip_monad = true;
    for &input in n.inputs().iter().rev() {
        let input_node = graph.node(input);
        if skip_monad && input_node.abstract_().is_some_and(|abs| abs.is_monad()) {
            continue;
        }
        skip_monad = false;
        ans += if input_node.class() == NodeClass::Virtual(VirtualOp::MakeTuple) {
            get_input_element_num(graph, input)?
        } else {
            1
        }
    }
    Ok(ans)
}

/// 构建信息声明的输出地址个数。
pub fn get_output_address_num(graph: &KernelGraph, node: NodeId) -> Result<usize, FatalError> {
    Ok(build_info(graph, node)?.output_num())
}

/// 输出张量在设备上的字节数。动态形状按上界计算，没有上界时按单个元素计算。
pub fn get_output_tensor_mem_size(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<usize, FatalError> {
    let mut shape = get_output_device_shape(graph, node, index)?;
    if is_dynamic_shape(&shape) {
        let max_shape = get_output_max_shape(graph, node, index)?;
        shape = if max_shape.is_empty() {
            vec![1]
        } else {
            max_shape
        }
    }
    get_output_tensor_mem_size_with_shape(graph, node, index, &shape)
}

/// 以给定的设备形状计算输出字节数。
pub fn get_output_tensor_mem_size_with_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
    real_shape: &[i64],
) -> Result<usize, FatalError> {
    let num = get_output_tensor_num(graph, node);
    if index >= num {
        return Err(
            index_out_of_range(format!("output {index} out of range {num}"))
                .at(node_name(graph, node)),
        );
    }
    let mut dtype = get_output_device_data_type(graph, node, index)?;
    if !dtype.is_valid() {
        dtype = get_output_infer_data_type(graph, node, index)?
    }

    let mut shape = real_shape.to_vec();
    let device_format = get_output_format(graph, node, index)?;
    if shape.is_empty() && device_format != format::DEFAULT {
        let reshape_type = get_output_reshape_type(graph, node, index)?;
        shape = trans::padding_shape(&shape, &device_format, &reshape_type);
        shape = trans::trans_shape_to_device(&shape, &device_format, dtype)?;
    }
    static_count(&shape)
        .and_then(|n| n.checked_mul(dtype.size()))
        .ok_or_else(|| invalid_shape(format!("{shape:?}")).at(node_name(graph, node)))
}
