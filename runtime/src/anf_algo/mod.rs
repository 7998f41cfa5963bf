//! 节点运行时元数据的统一查询和修改入口。
//!
//! 所有操作都是以图和节点编号为参数的自由函数，本身不持有状态。
//! 缺少必需的协作对象、下标越界等结构性问题返回 [`FatalError`]，并附带出错节点的调试字符串。

mod address;
mod backoff;
mod build_info;
mod count;
mod dtype;
mod format;
mod infer;
mod kernel_tensor;
mod object;
mod ref_pair;
mod schedule;
mod shape;
mod value_node;
mod visit;

pub use crate::device::format::is_equivalent_format;
pub use address::*;
pub use backoff::*;
pub use build_info::*;
pub use count::*;
pub use dtype::*;
pub use format::*;
pub use infer::*;
pub use kernel_tensor::*;
pub use object::*;
pub use ref_pair::*;
pub use schedule::*;
pub use shape::*;
pub use value_node::*;
pub use visit::*;

use crate::{
    device::{KernelBuildInfo, KernelInfo},
    ir::{Abstract, KernelGraph, NodeId},
    invalid_node, null_collaborator, FatalError,
};
use std::sync::Arc;

#[inline]
fn node_name(graph: &KernelGraph, node: NodeId) -> String {
    graph.node(node).debug_string()
}

fn node_abstract(graph: &KernelGraph, node: NodeId) -> Result<&Abstract, FatalError> {
    graph
        .node(node)
        .abstract_()
        .map(|abs| &**abs)
        .ok_or_else(|| null_collaborator("abstract").at(node_name(graph, node)))
}

fn kernel_info(graph: &KernelGraph, node: NodeId) -> Result<&KernelInfo, FatalError> {
    graph
        .node(node)
        .kernel_info()
        .ok_or_else(|| null_collaborator("kernel info").at(node_name(graph, node)))
}

fn kernel_info_mut(graph: &mut KernelGraph, node: NodeId) -> Result<&mut KernelInfo, FatalError> {
    let n = graph.node_mut(node);
    if n.kernel_info().is_none() {
        return Err(null_collaborator("kernel info").at(n.debug_string()));
    }
    Ok(n.kernel_info_or_default())
}

fn build_info(graph: &KernelGraph, node: NodeId) -> Result<&Arc<KernelBuildInfo>, FatalError> {
    kernel_info(graph, node)?
        .build_info()
        .ok_or_else(|| null_collaborator("kernel build info").at(node_name(graph, node)))
}

fn require_real_kernel(graph: &KernelGraph, node: NodeId) -> Result<(), FatalError> {
    if is_real_kernel(graph, node) {
        Ok(())
    } else {
        Err(invalid_node("not a real kernel").at(node_name(graph, node)))
    }
}

/// 节点对应真实的核函数，或者是参数和值节点。
#[inline]
pub fn is_real_kernel(graph: &KernelGraph, node: NodeId) -> bool {
    graph.node(node).class().is_real_kernel()
}

/// 节点是对应真实核函数的计算节点。
#[inline]
pub fn is_real_cnode_kernel(graph: &KernelGraph, node: NodeId) -> bool {
    let n = graph.node(node);
    n.is_cnode() && n.class().is_real_kernel()
}

#[inline]
pub fn is_nop_node(graph: &KernelGraph, node: NodeId) -> bool {
    graph.node(node).class().is_nop()
}

#[cfg(test)]
mod test_util {
    use crate::{
        device::{KernelBuildInfoBuilder, KernelObjectType},
        ir::KernelGraph,
        ir::NodeId,
    };
    use ::common::TypeId;

    /// 为节点设置选核结果。
    pub fn select(
        graph: &mut KernelGraph,
        node: NodeId,
        inputs: &[(&str, TypeId)],
        outputs: &[(&str, TypeId)],
    ) {
        let info = KernelBuildInfoBuilder::new()
            .inputs_format(inputs.iter().map(|(f, _)| *f))
            .inputs_device_type(inputs.iter().map(|(_, t)| *t).collect())
            .outputs_format(outputs.iter().map(|(f, _)| *f))
            .outputs_device_type(outputs.iter().map(|(_, t)| *t).collect())
            .outputs_kernel_object_type(vec![KernelObjectType::Tensor; outputs.len()])
            .build();
        super::set_select_kernel_build_info(graph, Some(info), node)
    }
}
