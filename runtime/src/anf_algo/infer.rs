use super::{
    fetch_device_target, get_node_abstract_by_index, get_output_addr, get_prev_node_output,
    input_tensor_num, is_dynamic_sequence, node_abstract, node_name,
};
use crate::{
    device::target,
    infer_failed, invalid_node,
    ir::{Abstract, HostTensor, KernelGraph, NodeId, Primitive, Value},
    FatalError,
};
use log::{debug, info};
use std::{collections::BTreeMap, sync::Arc};

/// 形状和类型推导的入口。
pub trait ShapeInfer {
    fn infer(&self, prim: &Primitive, args: &[Abstract]) -> Result<Abstract, FatalError>;
}

impl<F> ShapeInfer for F
where
    F: Fn(&Primitive, &[Abstract]) -> Result<Abstract, FatalError>,
{
    #[inline]
    fn infer(&self, prim: &Primitive, args: &[Abstract]) -> Result<Abstract, FatalError> {
        self(prim, args)
    }
}

/// 以已知的输入值重新推导节点的形状和类型。
///
/// `depend_tensors` 以输入序号为键。给出值的输入先同步到主机，再把值写入来源节点的抽象。
/// 主机核的所有依赖输入都已在主机上时不同步。
/// 抽象以新对象替换，已经取出的旧抽象不会看到变化。
pub fn infer_shape(
    graph: &mut KernelGraph,
    node: NodeId,
    depend_tensors: &BTreeMap<usize, Arc<HostTensor>>,
    infer: &dyn ShapeInfer,
) -> Result<(), FatalError> {
    info!("infer shape of {}", node_name(graph, node));
    let prim = graph
        .node(node)
        .prim()
        .cloned()
        .ok_or_else(|| invalid_node("infer shape of non-cnode").at(node_name(graph, node)))?;

    let skip_sync = skip_data_sync(graph, node, depend_tensors)?;
    let mut args = vec![];
    for i in 0..input_tensor_num(graph, node) {
        let (real, index) = get_prev_node_output(graph, node, i)?;
        if let Some(tensor) = depend_tensors.get(&i) {
            if !skip_sync {
                sync_host_tensor(graph, tensor)?
            }
            let mut abs = node_abstract(graph, real)?.clone();
            let value = Value::Tensor(tensor.clone());
            if matches!(abs, Abstract::Tensor { .. }) {
                abs.set_value(value);
            } else if !is_dynamic_sequence(graph, real) {
                if let Some(element) = abs.as_sequence_mut().and_then(|seq| seq.elements.get_mut(index)) {
                    element.set_value(value);
                }
            }
            graph.set_abstract(real, abs)
        }
        let arg = get_node_abstract_by_index(graph, real, index)?.ok_or_else(|| {
            infer_failed(format!("input {i} has no abstract")).at(node_name(graph, node))
        })?;
        args.push(arg.clone())
    }

    let abs = infer
        .infer(&prim, &args)
        .map_err(|e| e.at(node_name(graph, node)))?;
    graph.set_abstract(node, abs);
    Ok(())
}

/// 节点在主机上执行，且每个依赖输入的来源输出都在主机上，主机数据视为最新。
fn skip_data_sync(
    graph: &KernelGraph,
    node: NodeId,
    depend_tensors: &BTreeMap<usize, Arc<HostTensor>>,
) -> Result<bool, FatalError> {
    if fetch_device_target(graph, node) != target::CPU {
        return Ok(false);
    }
    for i in 0..input_tensor_num(graph, node) {
        if !depend_tensors.contains_key(&i) {
            continue;
        }
        let (real, _) = get_prev_node_output(graph, node, i)?;
        let id = get_output_addr(graph, real, 0, false)?;
        if graph.address(id).device_name() != target::CPU {
            return Ok(false);
        }
    }
    debug!("skip sync for host kernel {}", node_name(graph, node));
    Ok(true)
}

/// 把主机张量绑定的设备数据拷回主机。
fn sync_host_tensor(graph: &mut KernelGraph, tensor: &HostTensor) -> Result<(), FatalError> {
    let Some(id) = tensor.device_address() else {
        return Ok(());
    };
    let kernel_tensor = graph.address_mut(id).kernel_tensor_mut();
    kernel_tensor.sync_data_from_device_to_host()?;
    if let Some(data) = kernel_tensor.host_data() {
        tensor.write_data(data)
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        common_cpu::HostSynchronizer,
        device::DeviceAddress,
        ir::{BaseShape, Type},
        kernel::{DeviceInfo, KernelTensor},
        FatalErrorKind,
    };
    use ::common::TypeId;

    /// 以第 1 个输入的值作为输出形状。
    fn reshape_infer(_: &Primitive, args: &[Abstract]) -> Result<Abstract, FatalError> {
        let dims = match args.get(1).map(Abstract::build_value) {
            Some(Value::Tensor(t)) => t.to_i64s(),
            _ => None,
        }
        .ok_or_else(|| infer_failed("shape is unknown"))?;
        Ok(Abstract::tensor(TypeId::Float32, dims))
    }

    #[test]
    fn test_infer_with_depend_value() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2, 3]));
        let s = g.add_parameter("s", Abstract::tensor(TypeId::Int64, [2]));
        let op = g.add_cnode(
            Primitive::new("DynamicReshape"),
            vec![x, s],
            Some(Abstract::tensor(TypeId::Float32, [-1, -1])),
        );
        let before = g.node(s).abstract_().cloned().unwrap();

        // 没有给出值时推导失败，抽象不变
        let err = infer_shape(&mut g, op, &BTreeMap::new(), &reshape_infer).unwrap_err();
        assert_eq!(err.kind, FatalErrorKind::InferFailed);
        assert!(err.node.is_some());
        assert_eq!(g.node(op).abstract_().unwrap().build_shape(), BaseShape::tensor([-1, -1]));

        // 设备上的值 [3, 2] 覆盖主机上的旧值
        let device = [3i64, 2];
        let info = DeviceInfo::new(device.as_ptr().cast_mut().cast(), 16, "DefaultFormat", TypeId::Int64);
        let mut kt = KernelTensor::with_device_info(
            BaseShape::tensor([2]),
            Type::Tensor(TypeId::Int64),
            Value::Any,
            info,
        )
        .unwrap();
        kt.set_device_synchronizer(Arc::new(HostSynchronizer));
        let a = g.add_address(DeviceAddress::new(kt));
        let tensor = Arc::new(HostTensor::from_i64s(&[6, 1]).with_device_address(a));

        let depend = BTreeMap::from([(1, tensor.clone())]);
        infer_shape(&mut g, op, &depend, &reshape_infer).unwrap();
        assert_eq!(tensor.to_i64s().unwrap(), [3, 2]);
        assert_eq!(g.node(op).abstract_().unwrap().build_shape(), BaseShape::tensor([3, 2]));
        // 旧抽象的持有者不受影响
        assert_eq!(before.build_value(), Value::Any);
        assert!(matches!(g.node(s).abstract_().unwrap().build_value(), Value::Tensor(_)));
    }

    /// 以 `data` 为设备数据构造设备地址。
    fn device_address(g: &mut KernelGraph, data: &[i64], device_name: &str) -> crate::device::AddressId {
        let mut info = DeviceInfo::new(data.as_ptr().cast_mut().cast(), 16, "DefaultFormat", TypeId::Int64);
        info.device_name = device_name.into();
        let mut kt = KernelTensor::with_device_info(
            BaseShape::tensor([2]),
            Type::Tensor(TypeId::Int64),
            Value::Any,
            info,
        )
        .unwrap();
        kt.set_device_synchronizer(Arc::new(HostSynchronizer));
        g.add_address(DeviceAddress::new(kt))
    }

    #[test]
    fn test_host_kernel_skip_sync() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [6]));
        let s = g.add_parameter("s", Abstract::tensor(TypeId::Int64, [2]));
        let op = g.add_cnode(Primitive::new("DynamicReshape"), vec![x, s], None);

        let device = [3i64, 2];
        let a = device_address(&mut g, &device, target::CPU);
        let tensor = Arc::new(HostTensor::from_i64s(&[2, 3]).with_device_address(a));
        let depend = BTreeMap::from([(1, tensor.clone())]);

        // 来源没有输出地址
        assert_eq!(
            infer_shape(&mut g, op, &depend, &reshape_infer).unwrap_err().kind,
            FatalErrorKind::NullCollaborator
        );

        // 来源输出在主机上，主机数据视为最新
        crate::anf_algo::set_output_addr(&mut g, a, 0, s).unwrap();
        infer_shape(&mut g, op, &depend, &reshape_infer).unwrap();
        assert_eq!(tensor.to_i64s().unwrap(), [2, 3]);
        assert_eq!(g.node(op).abstract_().unwrap().build_shape(), BaseShape::tensor([2, 3]));

        let p = g.add_parameter("p", Abstract::None);
        assert_eq!(
            infer_shape(&mut g, p, &BTreeMap::new(), &reshape_infer).unwrap_err().kind,
            FatalErrorKind::InvalidNode
        );
    }

    #[test]
    fn test_host_kernel_sync_device_input() {
        let mut g = KernelGraph::new(0, "CPU");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [6]));
        let s = g.add_parameter("s", Abstract::tensor(TypeId::Int64, [2]));
        let t = g.add_parameter("t", Abstract::tensor(TypeId::Int64, [2]));
        let op = g.add_cnode(Primitive::new("DynamicReshape"), vec![x, s, t], None);

        // 一个依赖输入在主机上，另一个不在，整个节点都要同步
        let host = [1i64, 6];
        let device = [3i64, 2];
        let a = device_address(&mut g, &host, target::CPU);
        let b = device_address(&mut g, &device, "Ascend");
        crate::anf_algo::set_output_addr(&mut g, a, 0, t).unwrap();
        crate::anf_algo::set_output_addr(&mut g, b, 0, s).unwrap();
        let shape = Arc::new(HostTensor::from_i64s(&[6, 1]).with_device_address(b));
        let other = Arc::new(HostTensor::from_i64s(&[0, 0]).with_device_address(a));
        let depend = BTreeMap::from([(1, shape.clone()), (2, other.clone())]);
        infer_shape(&mut g, op, &depend, &reshape_infer).unwrap();
        assert_eq!(shape.to_i64s().unwrap(), [3, 2]);
        assert_eq!(other.to_i64s().unwrap(), [1, 6]);
        assert_eq!(g.node(op).abstract_().unwrap().build_shape(), BaseShape::tensor([3, 2]));
    }
}
