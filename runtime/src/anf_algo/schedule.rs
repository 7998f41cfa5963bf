use super::{get_input_device_shape, get_input_node, get_kernel_type, input_tensor_num, visit_kernel};
use crate::{
    device::KernelType,
    invalid_node,
    ir::{attr, prim, Abstract, KernelGraph, NodeClass, NodeId, Primitive, Value, VirtualOp},
    null_collaborator, FatalError,
};
use log::info;

/// 保证 `former` 先于 `latter` 执行。
///
/// 用 `Depend` 把 `former` 接到 `latter` 的首个输入上，
/// 再用 `Depend` 把 `latter` 接到图的输出上，防止它被剪除。
pub fn keep_order(graph: &mut KernelGraph, former: NodeId, latter: NodeId) -> Result<(), FatalError> {
    let Some(latter_input) = graph.node(latter).input(0) else {
        return Ok(());
    };
    let ret = graph
        .return_node()
        .ok_or_else(|| null_collaborator("graph has no return node"))?;
    let output = get_input_node(graph, ret, 0)?;

    let abs = graph.node(latter_input).abstract_().map(|a| (**a).clone());
    let depend = graph.add_cnode(Primitive::new(prim::DEPEND), vec![latter_input, former], abs);
    graph.set_input(latter, 0, depend);

    let abs = graph.node(output).abstract_().map(|a| (**a).clone());
    let depend = graph.add_cnode(Primitive::new(prim::DEPEND), vec![output, latter], abs);
    graph.set_output(depend);
    Ok(())
}

/// 节点可以脱离主执行序调度。
///
/// 要求是 AICPU 核，不是有顺序副作用的原语，并且没有输入或输入全是值节点。
pub fn is_independent_node(graph: &KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    if get_kernel_type(graph, node)? != KernelType::Aicpu {
        return Ok(false);
    }
    let n = graph.node(node);
    if let Some(prim) = n.prim().filter(|p| prim::ORDERED_AICPU_OPS.contains(&&*p.name)) {
        info!("{} should not be independent node", prim.name);
        return Ok(false);
    }
    if input_tensor_num(graph, node) == 0 {
        return Ok(true);
    }
    Ok(n
        .inputs()
        .iter()
        .all(|&input| graph.node(input).is_value_node()))
}

/// 节点输出依赖运行时数据。
///
/// 值节点只有所有张量都已经绑定设备地址时才算，`Load` 和 `Depend` 看输入 0。
pub fn is_feature_map_output(graph: &KernelGraph, node: NodeId) -> bool {
    let n = graph.node(node);
    if let Some(value) = n.value() {
        let tensors = value.tensors();
        return !tensors.is_empty() && tensors.iter().all(|t| t.device_address().is_some());
    }
    if let NodeClass::Virtual(VirtualOp::Load | VirtualOp::Depend) = n.class() {
        return n
            .input(0)
            .is_some_and(|input| is_feature_map_output(graph, input));
    }
    n.kernel_info().is_some_and(|info| info.is_feature_map())
}

pub fn is_feature_map_input(graph: &KernelGraph, node: NodeId, i: usize) -> Result<bool, FatalError> {
    if !graph.node(node).is_cnode() {
        return Err(invalid_node("parameter or value node has no feature map input")
            .at(graph.node(node).debug_string()));
    }
    Ok(is_feature_map_output(graph, get_input_node(graph, node, i)?))
}

/// 按输入刷新计算节点的特征图标记，没有输入的节点总是特征图。
pub fn update_feature_map_flag(graph: &mut KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    let num = input_tensor_num(graph, node);
    let mut flag = num == 0;
    for i in 0..num {
        flag |= is_feature_map_input(graph, node, i)?
    }
    graph
        .node_mut(node)
        .kernel_info_or_default()
        .set_feature_map_flag(flag);
    Ok(flag)
}

/// 归约轴为空张量且允许跳过时不需要执行。
#[inline]
pub fn is_dynamic_shape_skip_execute(skip_mode: bool, axes_shape: &[i64]) -> bool {
    skip_mode && axes_shape.contains(&0)
}

/// `ReduceSum` 节点在归约轴为空张量时跳过执行。
pub fn is_dynamic_shape_skip_node(graph: &KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    const AXES_INDEX: usize = 1;

    let n = graph.node(node);
    let Some(prim) = n
        .prim()
        .filter(|p| p.name == prim::REDUCE_SUM || p.name == prim::REDUCE_SUM_D)
    else {
        return Ok(false);
    };
    let skip_mode = prim
        .attr(attr::SKIP_MODE)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !skip_mode {
        return Ok(false);
    }
    let Some(axes) = n.input(AXES_INDEX) else {
        return Ok(false);
    };
    let axes_abs = graph
        .node(axes)
        .abstract_()
        .cloned()
        .ok_or_else(|| null_collaborator("abstract of axes").at(n.debug_string()))?;
    let axes_shape = get_input_device_shape(graph, node, AXES_INDEX)?;
    Ok(matches!(*axes_abs, Abstract::Tensor { .. }) && is_dynamic_shape_skip_execute(true, &axes_shape))
}

/// 执行后是否需要重新读取输出的形状和类型。
///
/// 整图下沉或没有核模块时总是需要。
pub fn is_need_update_shape_and_type_after_launch(graph: &KernelGraph, node: NodeId) -> bool {
    if graph.flags().graph_run_mode {
        return true;
    }
    graph
        .node(node)
        .kernel_info()
        .and_then(|info| info.kernel_mod())
        .map_or(true, |kernel_mod| kernel_mod.is_need_update_output_shape_and_size())
}

/// 某个输入来自执行后才确定输出形状的核。
pub fn has_computed_depend_input_node(graph: &KernelGraph, node: NodeId) -> Result<bool, FatalError> {
    for i in 0..input_tensor_num(graph, node) {
        let (real, _) = visit_kernel(graph, get_input_node(graph, node, i)?, 0)?;
        let real = graph.node(real);
        if !real.is_cnode() {
            continue;
        }
        if real
            .kernel_info()
            .and_then(|info| info.kernel_mod())
            .is_some_and(|kernel_mod| kernel_mod.is_need_update_output_shape_and_size())
        {
            return Ok(true);
        }
    }
    Ok(false)
}
