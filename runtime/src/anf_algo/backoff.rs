use super::{has_select_kernel_build_info, is_real_cnode_kernel, node_name};
use crate::{
    config::{self, RuntimeConfig},
    device::target,
    invalid_node,
    ir::{attr, prim, KernelGraph, NodeId, Value},
    FatalError,
};
use log::info;

/// 选核失败的异常种类。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(i32)]
pub enum ExceptionType {
    NoExceptionType = 0,
    UnknownError,
    ArgumentError,
    NotSupportError,
    NotExistsError,
    DeviceProcessError,
    AbortedError,
    IndexError,
    ValueError,
    TypeError,
    ShapeError,
    KeyError,
    AttributeError,
    NameError,
    AssertionError,
    BaseException,
    KeyboardInterrupt,
}

impl ExceptionType {
    pub const fn from_i32(value: i32) -> Option<Self> {
        use ExceptionType::*;
        const ALL: [ExceptionType; 17] = [
            NoExceptionType,
            UnknownError,
            ArgumentError,
            NotSupportError,
            NotExistsError,
            DeviceProcessError,
            AbortedError,
            IndexError,
            ValueError,
            TypeError,
            ShapeError,
            KeyError,
            AttributeError,
            NameError,
            AssertionError,
            BaseException,
            KeyboardInterrupt,
        ];
        if value >= 0 && (value as usize) < ALL.len() {
            Some(ALL[value as usize])
        } else {
            None
        }
    }
}

/// 节点的选核回退状态。
///
/// ```text
/// NotSelected ──选核成功──> Selected
///      │
///      └──首选失败且允许回退──> BackoffPending ──记录回退信息──> BackoffCommitted
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BackoffState {
    NotSelected,
    Selected,
    BackoffPending,
    BackoffCommitted,
}

/// 节点能否回退到其他设备的核，使用进程级配置。
#[inline]
pub fn is_node_support_kernel_select_backoff(graph: &KernelGraph, node: NodeId) -> bool {
    is_node_support_kernel_select_backoff_with(config::get(), graph, node)
}

/// 节点能否回退到其他设备的核。
///
/// 全局关闭回退时只有类型转换算子仍然可以回退；单算子图和反向图不回退。
pub fn is_node_support_kernel_select_backoff_with(
    config: &RuntimeConfig,
    graph: &KernelGraph,
    node: NodeId,
) -> bool {
    let is_type_transform = graph
        .node(node)
        .prim()
        .is_some_and(|p| prim::is_type_transform_op(&p.name));
    if config.disable_kernel_backoff && !is_type_transform {
        info!("kernel backoff is turned off by {}", config::DISABLE_KERNEL_BACKOFF);
        return false;
    }
    let flags = graph.flags();
    if flags.from_single_op {
        info!("single op graph {} does not support kernel backoff", graph.graph_id());
        return false;
    }
    if flags.pynative_bprop {
        info!("bprop graph {} does not support kernel backoff", graph.graph_id());
        return false;
    }
    true
}

/// 记录回退的失败信息，此后节点视为已回退。
pub fn set_kernel_select_backoff_info(
    graph: &mut KernelGraph,
    node: NodeId,
    (message, ty): (String, ExceptionType),
) -> Result<(), FatalError> {
    let n = graph.node_mut(node);
    let debug = n.debug_string();
    let prim = n
        .prim_mut()
        .ok_or_else(|| invalid_node("backoff info on non-cnode").at(debug))?;
    prim.set_attr(attr::BACKOFF_FAILURE_INFO, Value::Str(message));
    prim.set_attr(attr::BACKOFF_FAILURE_TYPE, Value::Int(ty as i32 as i64));
    Ok(())
}

/// 回退的失败信息，没有回退时为空信息和 [`ExceptionType::NoExceptionType`]。
pub fn get_kernel_select_backoff_info(
    graph: &KernelGraph,
    node: NodeId,
) -> Result<(String, ExceptionType), FatalError> {
    if !is_kernel_select_backoff_op(graph, node) {
        return Ok((String::new(), ExceptionType::NoExceptionType));
    }
    let malformed = || invalid_node("malformed backoff info").at(node_name(graph, node));
    let prim = graph.node(node).prim().ok_or_else(malformed)?;
    let message = prim
        .attr(attr::BACKOFF_FAILURE_INFO)
        .and_then(Value::as_str)
        .ok_or_else(malformed)?;
    let ty = prim
        .attr(attr::BACKOFF_FAILURE_TYPE)
        .and_then(Value::as_int)
        .and_then(|v| i32::try_from(v).ok())
        .and_then(ExceptionType::from_i32)
        .ok_or_else(malformed)?;
    Ok((message.into(), ty))
}

pub fn is_kernel_select_backoff_op(graph: &KernelGraph, node: NodeId) -> bool {
    graph.node(node).prim().is_some_and(|p| {
        p.has_attr(attr::BACKOFF_FAILURE_INFO) && p.has_attr(attr::BACKOFF_FAILURE_TYPE)
    })
}

/// 由节点元数据推出回退状态。`preferred_failed` 表示首选设备的选核已经失败。
pub fn kernel_select_backoff_state(
    config: &RuntimeConfig,
    graph: &KernelGraph,
    node: NodeId,
    preferred_failed: bool,
) -> BackoffState {
    if is_kernel_select_backoff_op(graph, node) {
        BackoffState::BackoffCommitted
    } else if has_select_kernel_build_info(graph, node) {
        BackoffState::Selected
    } else if preferred_failed && is_node_support_kernel_select_backoff_with(config, graph, node) {
        BackoffState::BackoffPending
    } else {
        BackoffState::NotSelected
    }
}

/// 节点实际执行的设备。
///
/// 节点上记录的设备优先，其余非计算节点跟随图。
/// 回退的节点在 CPU 上执行，原语指定了设备的节点在指定的设备上执行。
pub fn fetch_device_target(graph: &KernelGraph, node: NodeId) -> String {
    let n = graph.node(node);
    if let Some(target) = n.device_target() {
        return target.into();
    }
    if !n.is_cnode() {
        return graph.device_target().into();
    }
    if is_kernel_select_backoff_op(graph, node) {
        return target::CPU.into();
    }
    n.prim()
        .and_then(|p| p.attr(attr::PRIMITIVE_TARGET))
        .and_then(Value::as_str)
        .unwrap_or(graph.device_target())
        .into()
}

/// 参数的所有真实使用者都不在图的设备上时，把参数放到使用者的设备上。
pub fn set_parameter_device_target(graph: &mut KernelGraph) {
    let graph_target = graph.device_target().to_string();
    let mut changes = vec![];
    for &param in graph.parameters() {
        let users = graph.users(param);
        if users.is_empty() {
            continue;
        }
        let mut affinity = graph_target.clone();
        for (user, _) in users {
            if !is_real_cnode_kernel(graph, user) {
                continue;
            }
            affinity = fetch_device_target(graph, user);
            if affinity == graph_target {
                break;
            }
        }
        if affinity != graph_target {
            info!(
                "set device target of {} in graph {} from {graph_target} to {affinity}",
                node_name(graph, param),
                graph.graph_id()
            );
            changes.push((param, affinity))
        }
    }
    for (param, affinity) in changes {
        graph.node_mut(param).set_device_target(affinity)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        anf_algo::test_util::select,
        ir::{Abstract, Primitive},
    };
    use ::common::TypeId;
    use rand::Rng;

    const ENABLED: RuntimeConfig = RuntimeConfig {
        disable_kernel_backoff: false,
    };
    const DISABLED: RuntimeConfig = RuntimeConfig {
        disable_kernel_backoff: true,
    };

    #[test]
    fn test_disable_backoff() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let add = g.add_cnode(Primitive::new("Add"), vec![x, x], None);
        let cast = g.add_cnode(Primitive::new(prim::TUPLE_TO_TENSOR), vec![x], None);

        assert!(is_node_support_kernel_select_backoff_with(&ENABLED, &g, add));
        assert!(!is_node_support_kernel_select_backoff_with(&DISABLED, &g, add));
        assert!(is_node_support_kernel_select_backoff_with(&DISABLED, &g, cast));

        g.flags_mut().from_single_op = true;
        assert!(!is_node_support_kernel_select_backoff_with(&ENABLED, &g, cast));
        g.flags_mut().from_single_op = false;
        g.flags_mut().pynative_bprop = true;
        assert!(!is_node_support_kernel_select_backoff_with(&ENABLED, &g, cast));
    }

    #[test]
    fn test_backoff_info() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let op = g.add_cnode(Primitive::new("Add"), vec![x, x], None);
        assert!(set_kernel_select_backoff_info(&mut g, x, ("".into(), ExceptionType::TypeError)).is_err());
        assert_eq!(
            get_kernel_select_backoff_info(&g, op).unwrap(),
            (String::new(), ExceptionType::NoExceptionType)
        );

        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let len = rng.gen_range(1..16);
            let message = (0..len)
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect::<String>();
            let ty = ExceptionType::from_i32(rng.gen_range(0..17)).unwrap();
            set_kernel_select_backoff_info(&mut g, op, (message.clone(), ty)).unwrap();
            assert!(is_kernel_select_backoff_op(&g, op));
            assert_eq!(get_kernel_select_backoff_info(&g, op).unwrap(), (message, ty));
        }
        assert_eq!(ExceptionType::from_i32(17), None);
        assert_eq!(ExceptionType::from_i32(-1), None);
        assert_eq!(ExceptionType::from_i32(10), Some(ExceptionType::ShapeError));
    }

    #[test]
    fn test_state() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let op = g.add_cnode(Primitive::new("Add"), vec![x, x], None);

        assert_eq!(kernel_select_backoff_state(&ENABLED, &g, op, false), BackoffState::NotSelected);
        assert_eq!(kernel_select_backoff_state(&DISABLED, &g, op, true), BackoffState::NotSelected);
        assert_eq!(kernel_select_backoff_state(&ENABLED, &g, op, true), BackoffState::BackoffPending);
        set_kernel_select_backoff_info(&mut g, op, ("no ascend kernel".into(), ExceptionType::NotSupportError))
            .unwrap();
        select(&mut g, op, &[], &[]);
        assert_eq!(kernel_select_backoff_state(&ENABLED, &g, op, true), BackoffState::BackoffCommitted);
        assert_eq!(fetch_device_target(&g, op), target::CPU);

        let other = g.add_cnode(Primitive::new("Mul"), vec![x, x], None);
        select(&mut g, other, &[], &[]);
        assert_eq!(kernel_select_backoff_state(&ENABLED, &g, other, true), BackoffState::Selected);
    }

    #[test]
    fn test_device_target() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [2]));
        let y = g.add_parameter("y", Abstract::tensor(TypeId::Float32, [2]));
        let z = g.add_parameter("z", Abstract::tensor(TypeId::Float32, [2]));
        let on_cpu = Primitive::new("Print").with_attr(attr::PRIMITIVE_TARGET, Value::Str("CPU".into()));
        let on_gpu = Primitive::new("Add").with_attr(attr::PRIMITIVE_TARGET, Value::Str("GPU".into()));
        let print = g.add_cnode(on_cpu, vec![x], None);
        let add = g.add_cnode(on_gpu, vec![y, x], None);
        let relu = g.add_cnode(Primitive::new("Relu"), vec![y], None);
        let _ = g.add_cnode(Primitive::new(prim::DEPEND), vec![z, x], None);

        assert_eq!(fetch_device_target(&g, print), target::CPU);
        assert_eq!(fetch_device_target(&g, add), "GPU");
        assert_eq!(fetch_device_target(&g, relu), "Ascend");
        assert_eq!(fetch_device_target(&g, x), "Ascend");

        set_parameter_device_target(&mut g);
        // x 的真实使用者都不在图的设备上，取最后一个
        assert_eq!(g.node(x).device_target(), Some("GPU"));
        // y 有使用者在图的设备上
        assert_eq!(g.node(y).device_target(), None);
        assert_eq!(g.node(z).device_target(), None);

        let w = g.add_parameter("w", Abstract::tensor(TypeId::Float32, [2]));
        let _ = g.add_cnode(
            Primitive::new("Log").with_attr(attr::PRIMITIVE_TARGET, Value::Str("CPU".into())),
            vec![w],
            None,
        );
        set_parameter_device_target(&mut g);
        assert_eq!(g.node(w).device_target(), Some(target::CPU));
        assert_eq!(fetch_device_target(&g, w), target::CPU);
    }
}
