use super::{build_info, is_real_kernel, kernel_info, node_name};
use crate::{
    device::{KernelBuildInfo, KernelBuildInfoBuilder, KernelType, OpType, Processor},
    ir::{attr, KernelGraph, NodeId, Primitive, Value},
    kernel::KernelMod,
    FatalError,
};
use log::debug;
use std::sync::Arc;

/// 尚未选核时的融合类型。
pub const FUSION_TYPE_UNKNOWN: &str = "unknown";

/// 设置选核结果，节点没有核信息时创建。
///
/// 新结果没有声明输入或输出的对象类型时，沿用旧结果上的声明。
pub fn set_select_kernel_build_info(
    graph: &mut KernelGraph,
    info: Option<Arc<KernelBuildInfo>>,
    node: NodeId,
) {
    let kernel_info = graph.node_mut(node).kernel_info_or_default();
    let info = match (kernel_info.build_info(), info) {
        (Some(old), Some(new)) => {
            let inherit_inputs = new.input_kernel_object_types().is_empty()
                && !old.input_kernel_object_types().is_empty();
            let inherit_outputs = new.output_kernel_object_types().is_empty()
                && !old.output_kernel_object_types().is_empty();
            if inherit_inputs || inherit_outputs {
                let mut builder = KernelBuildInfoBuilder::from_info(&new);
                if inherit_inputs {
                    builder = builder.inputs_kernel_object_type(old.input_kernel_object_types().to_vec())
                }
                if inherit_outputs {
                    builder =
                        builder.outputs_kernel_object_type(old.output_kernel_object_types().to_vec())
                }
                Some(builder.build())
            } else {
                Some(new)
            }
        }
        (_, info) => info,
    };
    kernel_info.set_build_info(info)
}

/// 选核结果，没有核信息或尚未选核时为 [None]。
#[inline]
pub fn get_select_kernel_build_info(graph: &KernelGraph, node: NodeId) -> Option<Arc<KernelBuildInfo>> {
    graph.node(node).kernel_info()?.build_info().cloned()
}

#[inline]
pub fn has_select_kernel_build_info(graph: &KernelGraph, node: NodeId) -> bool {
    graph
        .node(node)
        .kernel_info()
        .is_some_and(|info| info.has_build_info())
}

/// 修改选核结果的一部分，其余保持不变。
fn rebuild(
    graph: &mut KernelGraph,
    node: NodeId,
    f: impl FnOnce(KernelBuildInfoBuilder) -> KernelBuildInfoBuilder,
) -> Result<(), FatalError> {
    let builder = KernelBuildInfoBuilder::from_info(build_info(graph, node)?);
    set_select_kernel_build_info(graph, Some(f(builder).build()), node);
    Ok(())
}

pub fn get_kernel_type(graph: &KernelGraph, node: NodeId) -> Result<KernelType, FatalError> {
    match kernel_info(graph, node)?.build_info() {
        Some(build) => Ok(build.kernel_type()),
        None => {
            debug!("{} has no kernel build info", node_name(graph, node));
            Ok(KernelType::Unknown)
        }
    }
}

#[inline]
pub fn set_fusion_type(graph: &mut KernelGraph, node: NodeId, ty: impl Into<String>) -> Result<(), FatalError> {
    let ty = ty.into();
    rebuild(graph, node, |builder| builder.fusion_type(ty))
}

pub fn get_fusion_type(graph: &KernelGraph, node: NodeId) -> Result<String, FatalError> {
    Ok(kernel_info(graph, node)?
        .build_info()
        .map_or(FUSION_TYPE_UNKNOWN, |build| build.fusion_type())
        .into())
}

/// 设置核心类型，只对真实核生效。
pub fn set_core_type(graph: &mut KernelGraph, node: NodeId, ty: impl Into<String>) -> Result<(), FatalError> {
    if !is_real_kernel(graph, node) {
        return Ok(());
    }
    let ty = ty.into();
    rebuild(graph, node, |builder| builder.core_type(ty))
}

/// 核心类型，虚拟节点为空。
pub fn get_core_type(graph: &KernelGraph, node: NodeId) -> Result<String, FatalError> {
    if !is_real_kernel(graph, node) {
        return Ok(String::new());
    }
    Ok(build_info(graph, node)?.core_type().into())
}

#[inline]
pub fn get_processor(graph: &KernelGraph, node: NodeId) -> Result<Processor, FatalError> {
    Ok(build_info(graph, node)?.processor())
}

#[inline]
pub fn get_op_type(graph: &KernelGraph, node: NodeId) -> Result<OpType, FatalError> {
    Ok(build_info(graph, node)?.op_type())
}

/// 原语显式关闭随机数缓存时，需要在编译缓存中擦除。
pub fn need_erase_cache(prim: &Primitive) -> bool {
    prim.attr(attr::RANDOM_CACHE)
        .and_then(Value::as_bool)
        .is_some_and(|cache| !cache)
}

#[inline]
pub fn get_kernel_mod(graph: &KernelGraph, node: NodeId) -> Result<Option<&dyn KernelMod>, FatalError> {
    Ok(kernel_info(graph, node)?.kernel_mod())
}

/// 设置核模块，节点没有核信息时创建。
#[inline]
pub fn set_kernel_mod(graph: &mut KernelGraph, kernel_mod: Box<dyn KernelMod>, node: NodeId) {
    graph
        .node_mut(node)
        .kernel_info_or_default()
        .set_kernel_mod(kernel_mod)
}

macro_rules! scheduling {
    ($set:ident $get:ident $field:ident $set_field:ident) => {
        #[inline]
        pub fn $set(graph: &mut KernelGraph, value: u32, node: NodeId) {
            graph.node_mut(node).kernel_info_or_default().$set_field(value)
        }

        #[inline]
        pub fn $get(graph: &KernelGraph, node: NodeId) -> Result<u32, FatalError> {
            Ok(kernel_info(graph, node)?.$field())
        }
    };
}

scheduling!(set_stream_id                 get_stream_id                 stream_id                 set_stream_id                );
scheduling!(set_stream_distinction_label  get_stream_distinction_label  stream_distinction_label  set_stream_distinction_label );
scheduling!(set_graph_id                  get_graph_id                  graph_id                  set_graph_id                 );
