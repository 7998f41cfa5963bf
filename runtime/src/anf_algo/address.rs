use super::{
    get_output_tensor_mem_size, get_prev_node_output, is_nop_node, kernel_info, node_name,
};
use crate::{
    device::{AddressId, DeviceAddress},
    index_out_of_range, invalid_node,
    ir::{attr, KernelGraph, NodeId, Value},
    missing_address, FatalError,
};
use log::debug;

/// 无操作节点是否通过属性要求跳过地址分配。
pub fn need_skip_nop_op_addr(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .prim()
        .and_then(|prim| prim.attr(attr::SKIP_NOP_OP_ADDR))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[inline]
fn skip_nop(graph: &KernelGraph, node: NodeId, skip_nop_node: bool) -> bool {
    is_nop_node(graph, node) && (skip_nop_node || need_skip_nop_op_addr(graph, node))
}

/// 输出的设备地址。
///
/// 依次尝试：
///
/// 1. 前向输出的常量张量上已经绑定的地址；
/// 2. 需要跳过的无操作节点复用输入 0 的地址；
/// 3. 节点核信息中的地址。
pub fn get_output_addr(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
    skip_nop_node: bool,
) -> Result<AddressId, FatalError> {
    let n = graph.node(node);
    if let Some(address) = n
        .value()
        .and_then(Value::as_tensor)
        .filter(|t| t.is_forward_output())
        .and_then(|t| t.device_address())
    {
        return Ok(address);
    }
    if skip_nop(graph, node, skip_nop_node) {
        return if n.inputs().len() == 1 || need_skip_nop_op_addr(graph, node) {
            get_prev_node_output_addr(graph, node, 0, skip_nop_node)
        } else {
            Err(invalid_node("invalid nop node").at(n.debug_string()))
        };
    }
    kernel_info(graph, node)?
        .output_addr(index)
        .ok_or_else(|| missing_address(format!("output {index} is not exist")).at(n.debug_string()))
}

#[inline]
pub fn get_output_device_address(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
    skip_nop_node: bool,
) -> Result<&DeviceAddress, FatalError> {
    get_output_addr(graph, node, index, skip_nop_node).map(|id| graph.address(id))
}

#[inline]
pub fn get_mutable_output_addr(
    graph: &mut KernelGraph,
    node: NodeId,
    index: usize,
    skip_nop_node: bool,
) -> Result<&mut DeviceAddress, FatalError> {
    let id = get_output_addr(graph, node, index, skip_nop_node)?;
    Ok(graph.address_mut(id))
}

/// 输出地址是否已经设置。被跳过的无操作节点看输入 0 的地址，没有核信息的节点没有地址。
pub fn output_addr_exist(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
    skip_nop_node: bool,
) -> Result<bool, FatalError> {
    if skip_nop(graph, node, skip_nop_node) {
        return if graph.node(node).inputs().is_empty() {
            Ok(false)
        } else {
            let (prev, index) = get_prev_node_output(graph, node, 0)?;
            output_addr_exist(graph, prev, index, skip_nop_node)
        };
    }
    Ok(graph
        .node(node)
        .kernel_info()
        .is_some_and(|info| info.output_addr_exist(index)))
}

#[inline]
pub fn workspace_addr_exist(graph: &KernelGraph, node: NodeId, index: usize) -> Result<bool, FatalError> {
    Ok(kernel_info(graph, node)?.workspace_addr_exist(index))
}

#[inline]
pub fn get_prev_node_output_addr(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
    skip_nop_node: bool,
) -> Result<AddressId, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_addr(graph, prev, index, skip_nop_node)
}

/// 设置输出地址，节点没有核信息时创建。
pub fn set_output_addr(
    graph: &mut KernelGraph,
    address: AddressId,
    index: usize,
    node: NodeId,
) -> Result<(), FatalError> {
    let n = graph.node_mut(node);
    if n.kernel_info_or_default().set_output_addr(Some(address), index) {
        Ok(())
    } else {
        Err(index_out_of_range(format!("set output {index} failed")).at(n.debug_string()))
    }
}

/// 设置工作空间地址，节点没有核信息时创建。
pub fn set_workspace_addr(
    graph: &mut KernelGraph,
    address: AddressId,
    index: usize,
    node: NodeId,
) -> Result<(), FatalError> {
    let n = graph.node_mut(node);
    if n.kernel_info_or_default().set_workspace_addr(Some(address), index) {
        Ok(())
    } else {
        Err(index_out_of_range(format!("set workspace {index} failed")).at(n.debug_string()))
    }
}

pub fn get_workspace_addr(graph: &KernelGraph, node: NodeId, index: usize) -> Result<AddressId, FatalError> {
    kernel_info(graph, node)?.workspace_addr(index).ok_or_else(|| {
        missing_address(format!("workspace {index} is not exist")).at(node_name(graph, node))
    })
}

#[inline]
pub fn get_mutable_workspace_addr(
    graph: &mut KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<&mut DeviceAddress, FatalError> {
    let id = get_workspace_addr(graph, node, index)?;
    Ok(graph.address_mut(id))
}

/// 按当前推导形状刷新所有输出地址的大小。
pub fn update_output_addr_size(graph: &mut KernelGraph, node: NodeId) -> Result<(), FatalError> {
    let addresses = kernel_info(graph, node)?.output_address_list().to_vec();
    for (i, address) in addresses.into_iter().enumerate() {
        let Some(id) = address else {
            return Err(missing_address(format!("output {i} is not exist")).at(node_name(graph, node)));
        };
        let size = get_output_tensor_mem_size(graph, node, i)?;
        let address = graph.address_mut(id);
        if address.size() != size {
            debug!("update output {i} of {node} size {} -> {size}", address.size());
            address.set_size(size)
        }
    }
    Ok(())
}
