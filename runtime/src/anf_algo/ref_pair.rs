use super::{get_input_node, get_output_tensor_num, kernel_info, node_name, visit_kernel};
use crate::{
    ir::{KernelGraph, KernelWithIndex, NodeId},
    FatalError,
};
use log::{debug, info, warn};
use std::collections::{btree_map::Entry, BTreeMap};

/// 把执行序中所有节点的输出对输入别名登记到图上。
pub fn add_out_in_ref_to_graph(graph: &mut KernelGraph) -> Result<(), FatalError> {
    for node in graph.execution_order().to_vec() {
        add_node_out_in_ref_to_graph(graph, node)?
    }
    Ok(())
}

/// 把节点核信息中的输出对输入别名登记到图上。副作用输入不登记。
pub fn add_node_out_in_ref_to_graph(graph: &mut KernelGraph, node: NodeId) -> Result<(), FatalError> {
    let refs = kernel_info(graph, node)?
        .out_in_ref_map()
        .iter()
        .map(|(&output, &input)| (output, input))
        .collect::<Vec<_>>();
    for (output, input) in refs {
        let origin = visit_kernel(graph, get_input_node(graph, node, input)?, 0)?;
        info!(
            "{} output {output} refers to {} output {}",
            node_name(graph, node),
            node_name(graph, origin.0),
            origin.1
        );
        let is_monad = graph
            .node(origin.0)
            .abstract_()
            .is_some_and(|abs| abs.is_monad());
        if !is_monad {
            graph.add_ref_correspond_pairs((node, output), origin)
        }
    }
    Ok(())
}

/// 只保留执行序中节点的别名。
///
/// 内存由外部图引擎管理时不做修改。
pub fn update_graph_valid_ref_pair(graph: &mut KernelGraph) {
    if graph.flags().ge_managed {
        return;
    }
    let refs = graph.ref_out_in_map();
    let mut valid = BTreeMap::<KernelWithIndex, KernelWithIndex>::new();
    for &node in graph.execution_order() {
        let num = get_output_tensor_num(graph, node);
        if num == 0 {
            debug!("{} has no output", node_name(graph, node));
            continue;
        }
        for i in 0..num {
            let Some(&origin) = refs.get(&(node, i)) else {
                continue;
            };
            match valid.entry((node, i)) {
                Entry::Vacant(entry) => {
                    entry.insert(origin);
                }
                Entry::Occupied(_) => warn!("duplicate ref pair of {} output {i}", node_name(graph, node)),
            }
        }
    }
    graph.set_ref_out_in_map(valid)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ir::{Abstract, MonadKind, Primitive},
        FatalErrorKind,
    };
    use ::common::TypeId;

    #[test]
    fn test_add_out_in_ref() {
        let mut g = KernelGraph::new(0, "Ascend");
        let var = g.add_parameter("var", Abstract::tensor(TypeId::Float32, [4]));
        let grad = g.add_parameter("grad", Abstract::tensor(TypeId::Float32, [4]));
        let u = g.add_parameter("u", Abstract::Monad(MonadKind::U));
        let load = g.add_cnode(Primitive::new("Load"), vec![var, u], None);
        let assign = g.add_cnode(
            Primitive::new("AssignAdd"),
            vec![load, grad, u],
            Some(Abstract::tensor(TypeId::Float32, [4])),
        );
        assert_eq!(
            add_node_out_in_ref_to_graph(&mut g, assign).unwrap_err().kind,
            FatalErrorKind::NullCollaborator
        );

        let info = g.node_mut(assign).kernel_info_or_default();
        info.add_ref_map(0, 0);
        info.add_ref_map(1, 2);
        add_node_out_in_ref_to_graph(&mut g, assign).unwrap();
        // Load 被穿过，副作用输入不登记
        assert_eq!(g.ref_out_in_map().len(), 1);
        assert_eq!(g.ref_out_in_map()[&(assign, 0)], (var, 0));
        assert!(g.is_in_ref_out_map((assign, 0)));
        assert!(!g.is_in_ref_out_map((assign, 1)));
    }

    #[test]
    fn test_add_out_in_ref_of_graph() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [4]));
        let y = g.add_parameter("y", Abstract::tensor(TypeId::Float32, [4]));
        let a = g.add_cnode(Primitive::new("Assign"), vec![x, y], Some(Abstract::tensor(TypeId::Float32, [4])));
        let b = g.add_cnode(Primitive::new("Assign"), vec![y, x], Some(Abstract::tensor(TypeId::Float32, [4])));
        let c = g.add_cnode(Primitive::new("Assign"), vec![x, x], Some(Abstract::tensor(TypeId::Float32, [4])));
        for node in [a, b, c] {
            g.node_mut(node).kernel_info_or_default().add_ref_map(0, 0)
        }
        // 不在执行序中的节点不登记
        g.set_execution_order(vec![a, b]);
        add_out_in_ref_to_graph(&mut g).unwrap();
        assert_eq!(
            g.ref_out_in_map().iter().collect::<Vec<_>>(),
            [(&(a, 0), &(x, 0)), (&(b, 0), &(y, 0))]
        );
        assert!(!g.is_in_ref_out_map((c, 0)));

        // 执行序中的节点必须有核信息
        let d = g.add_cnode(Primitive::new("Relu"), vec![x], Some(Abstract::tensor(TypeId::Float32, [4])));
        g.set_execution_order(vec![a, d]);
        assert_eq!(
            add_out_in_ref_to_graph(&mut g).unwrap_err().kind,
            FatalErrorKind::NullCollaborator
        );
    }

    #[test]
    fn test_update_valid_ref_pair() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float32, [4]));
        let y = g.add_parameter("y", Abstract::tensor(TypeId::Float32, [4]));
        let a = g.add_cnode(Primitive::new("Assign"), vec![x, y], Some(Abstract::tensor(TypeId::Float32, [4])));
        let b = g.add_cnode(Primitive::new("Assign"), vec![y, x], Some(Abstract::tensor(TypeId::Float32, [4])));
        g.add_ref_correspond_pairs((a, 0), (x, 0));
        g.add_ref_correspond_pairs((b, 0), (y, 0));
        g.set_execution_order(vec![a]);

        g.flags_mut().ge_managed = true;
        update_graph_valid_ref_pair(&mut g);
        assert_eq!(g.ref_out_in_map().len(), 2);

        g.flags_mut().ge_managed = false;
        update_graph_valid_ref_pair(&mut g);
        assert_eq!(
            g.ref_out_in_map().iter().collect::<Vec<_>>(),
            [(&(a, 0), &(x, 0))]
        );

        // 重复出现的节点只保留一次
        g.add_ref_correspond_pairs((b, 0), (y, 0));
        g.set_execution_order(vec![a, b, a]);
        update_graph_valid_ref_pair(&mut g);
        assert_eq!(g.ref_out_in_map().len(), 2);
    }
}
