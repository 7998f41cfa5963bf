use super::{
    get_node_abstract_by_index, get_output_device_data_type, get_output_format,
    get_output_tensor_num, get_prev_node_output, input_tensor_num, kernel_info, node_name,
};
use crate::{
    ir::{BaseShape, KernelGraph, KernelWithIndex, NodeId, Type, Value},
    kernel::{DeviceInfo, KernelTensor},
    missing_address, null_collaborator, FatalError,
};
use log::info;

/// 构造核张量所需的形状、类型和值。
///
/// 值节点取整个值，其他节点取第 `index` 个输出的抽象，值未知。
/// 已选核的张量输出以设备类型为准。
pub fn get_abstract_info(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<(BaseShape, Type, Value), FatalError> {
    let n = graph.node(node);
    let (shape, mut ty, value) = match n.value() {
        Some(value) => {
            let abs = match n.abstract_() {
                Some(abs) => (**abs).clone(),
                None => value.to_abstract(),
            };
            (abs.build_shape(), abs.build_type(), value.clone())
        }
        None => {
            let abs = get_node_abstract_by_index(graph, node, index)?.ok_or_else(|| {
                null_collaborator(format!("abstract of output {index}")).at(n.debug_string())
            })?;
            (abs.build_shape(), abs.build_type(), Value::Any)
        }
    };
    if let Type::Tensor(infer) = ty {
        if n.kernel_info().is_some_and(|info| info.has_build_info()) {
            let device = get_output_device_data_type(graph, node, index)?;
            if device.is_valid() && device != infer {
                info!(
                    "{} output {index} use device type {device:?} instead of {infer:?}",
                    n.debug_string()
                );
                ty = Type::Tensor(device)
            }
        }
    }
    Ok((shape, ty, value))
}

/// 输出核张量是否存在，设备地址上的核张量也算。
pub fn exist_output_kernel_tensor(graph: &KernelGraph, node: NodeId, index: usize) -> bool {
    graph.node(node).kernel_info().is_some_and(|info| {
        info.output_addr_exist(index) || info.output_kernel_tensor_exist(index)
    })
}

/// 输出核张量。优先使用设备地址上的核张量。
pub fn get_output_kernel_tensor(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<&KernelTensor, FatalError> {
    let info = kernel_info(graph, node)?;
    if let Some(id) = info.output_addr(index) {
        return Ok(graph.address(id).kernel_tensor());
    }
    info.output_kernel_tensor(index).ok_or_else(|| {
        missing_address(format!("output {index} has no kernel tensor")).at(node_name(graph, node))
    })
}

fn create_output_kernel_tensor(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<KernelTensor, FatalError> {
    let (shape, ty, value) = get_abstract_info(graph, node, index)?;
    let mut tensor = KernelTensor::new(shape, ty, value).map_err(|e| e.at(node_name(graph, node)))?;
    if let Some(info) = graph.node(node).kernel_info() {
        if info.has_build_info() {
            tensor.set_format(get_output_format(graph, node, index)?)
        }
        tensor.set_stream_id(info.stream_id())
    }
    Ok(tensor)
}

/// 输出核张量，不存在时由抽象创建并存入核信息。
pub fn get_or_create_output_kernel_tensor(
    graph: &mut KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<&KernelTensor, FatalError> {
    if !exist_output_kernel_tensor(graph, node, index) {
        let tensor = create_output_kernel_tensor(graph, node, index)?;
        graph
            .node_mut(node)
            .kernel_info_or_default()
            .set_output_kernel_tensor(tensor, index)
    }
    get_output_kernel_tensor(graph, node, index)
}

#[inline]
pub fn get_prev_node_output_kernel_tensor(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<&KernelTensor, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_kernel_tensor(graph, prev, index)
}

#[inline]
pub fn get_or_create_prev_node_output_kernel_tensor(
    graph: &mut KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<&KernelTensor, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_or_create_output_kernel_tensor(graph, prev, index)
}

/// 所有输入的核张量，按输入顺序。
pub fn get_or_create_all_input_kernel_tensors(
    graph: &mut KernelGraph,
    node: NodeId,
) -> Result<Vec<&KernelTensor>, FatalError> {
    let num = input_tensor_num(graph, node);
    for i in 0..num {
        get_or_create_prev_node_output_kernel_tensor(graph, node, i)?;
    }
    let graph = &*graph;
    (0..num)
        .map(|i| get_prev_node_output_kernel_tensor(graph, node, i))
        .collect()
}

/// 所有输出的核张量，按输出顺序。
pub fn get_or_create_all_output_kernel_tensors(
    graph: &mut KernelGraph,
    node: NodeId,
) -> Result<Vec<&KernelTensor>, FatalError> {
    let num = get_output_tensor_num(graph, node);
    for i in 0..num {
        get_or_create_output_kernel_tensor(graph, node, i)?;
    }
    let graph = &*graph;
    (0..num)
        .map(|i| get_output_kernel_tensor(graph, node, i))
        .collect()
}

/// 以节点输出的抽象和给定的设备信息构造核张量，不存入核信息。
pub fn create_output_kernel_tensor_with_device_info(
    graph: &KernelGraph,
    (node, index): KernelWithIndex,
    info: DeviceInfo,
) -> Result<KernelTensor, FatalError> {
    let (shape, ty, value) = get_abstract_info(graph, node, index)?;
    KernelTensor::with_device_info(shape, ty, value, info).map_err(|e| e.at(node_name(graph, node)))
}

/// 所有输入核张量的字节数。
pub fn get_node_input_size_list(graph: &mut KernelGraph, node: NodeId) -> Result<Vec<usize>, FatalError> {
    Ok(get_or_create_all_input_kernel_tensors(graph, node)?
        .into_iter()
        .map(KernelTensor::size)
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        anf_algo::{set_output_addr, test_util::select},
        device::{format::NC1HWC0, DeviceAddress},
        ir::{Abstract, MonadKind, ObjectType, Primitive},
        FatalErrorKind,
    };
    use ::common::TypeId;

    #[test]
    fn test_get_or_create() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2, 16, 4, 4]));
        select(&mut g, x, &[], &[(NC1HWC0, TypeId::Float16)]);
        let axis = g.add_value_node(Value::Int(1));
        let u = g.add_parameter("u", Abstract::Monad(MonadKind::U));
        let op = g.add_cnode(
            Primitive::new("Concat"),
            vec![x, axis, u],
            Some(Abstract::tensor(TypeId::Float32, [2, 32, 4, 4])),
        );

        assert!(!exist_output_kernel_tensor(&g, x, 0));
        assert_eq!(
            get_output_kernel_tensor(&g, x, 0).unwrap_err().kind,
            FatalErrorKind::MissingAddress
        );
        let inputs = get_or_create_all_input_kernel_tensors(&mut g, op).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].dtype_id(), TypeId::Float16);
        assert_eq!(inputs[0].format(), NC1HWC0);
        assert_eq!(inputs[0].size(), 2 * 16 * 4 * 4 * 2);
        assert_eq!(inputs[1].object_type(), ObjectType::Number);
        assert_eq!(inputs[1].value(), &Value::Int(1));
        assert!(exist_output_kernel_tensor(&g, x, 0));

        assert_eq!(get_node_input_size_list(&mut g, op).unwrap(), [1024, 8]);
        let outputs = get_or_create_all_output_kernel_tensors(&mut g, op).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape_vector(), [2, 32, 4, 4]);
        assert_eq!(outputs[0].value(), &Value::Any);
    }

    #[test]
    fn test_address_tensor_first() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [3]));
        let created = get_or_create_output_kernel_tensor(&mut g, x, 0).unwrap().size();
        assert_eq!(created, 12);

        let info = DeviceInfo::new(std::ptr::null_mut(), 64, "DefaultFormat", TypeId::Float32);
        let tensor = create_output_kernel_tensor_with_device_info(&g, (x, 0), info).unwrap();
        assert_eq!(tensor.size(), 64);
        let a = g.add_address(DeviceAddress::new(tensor));
        set_output_addr(&mut g, a, 0, x).unwrap();
        assert_eq!(get_output_kernel_tensor(&g, x, 0).unwrap().size(), 64);
        assert_eq!(get_or_create_output_kernel_tensor(&mut g, x, 0).unwrap().size(), 64);
    }
}
