use super::{
    get_input_device_data_type, get_input_format, get_input_reshape_type,
    get_output_device_data_type, get_output_format, get_output_infer_shape,
    get_output_reshape_type, get_prev_node_output, get_prev_node_output_infer_shape,
};
use crate::{
    device::trans,
    ir::{KernelGraph, NodeId},
    FatalError,
};

/// 输出在设备上的形状。
///
/// 推导形状先在逻辑空间按补齐规则补齐，再变换为格式要求的设备布局。
/// 推导形状为空时直接返回。
pub fn get_output_device_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<Vec<i64>, FatalError> {
    let format = get_output_format(graph, node, index)?;
    let mut shape = get_output_infer_shape(graph, node, index)?;
    if shape.is_empty() {
        return Ok(shape);
    }
    if trans::is_need_padding(&format, &shape) {
        let reshape_type = get_output_reshape_type(graph, node, index)?;
        shape = trans::padding_shape(&shape, &format, &reshape_type)
    }
    let dtype = get_output_device_data_type(graph, node, index)?;
    trans::trans_shape_to_device(&shape, &format, dtype).map_err(|e| e.at(graph.node(node).debug_string()))
}

/// 输入在设备上的形状，格式和类型以本节点的选核结果为准。
pub fn get_input_device_shape(
    graph: &KernelGraph,
    node: NodeId,
    index: usize,
) -> Result<Vec<i64>, FatalError> {
    let format = get_input_format(graph, node, index)?;
    let mut shape = get_prev_node_output_infer_shape(graph, node, index)?;
    if shape.is_empty() {
        return Ok(shape);
    }
    if trans::is_need_padding(&format, &shape) {
        let reshape_type = get_input_reshape_type(graph, node, index)?;
        shape = trans::padding_shape(&shape, &format, &reshape_type)
    }
    let dtype = get_input_device_data_type(graph, node, index)?;
    trans::trans_shape_to_device(&shape, &format, dtype).map_err(|e| e.at(graph.node(node).debug_string()))
}

#[inline]
pub fn get_prev_node_output_device_shape(
    graph: &KernelGraph,
    node: NodeId,
    i: usize,
) -> Result<Vec<i64>, FatalError> {
    let (prev, index) = get_prev_node_output(graph, node, i)?;
    get_output_device_shape(graph, prev, index)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        anf_algo::test_util::select,
        device::format::{DEFAULT, FRACTAL_NZ, NC1HWC0, NHWC},
        ir::{Abstract, Primitive},
    };
    use ::common::TypeId;

    #[test]
    fn test_device_shape() {
        let mut g = KernelGraph::new(0, "Ascend");
        let x = g.add_parameter("x", Abstract::tensor(TypeId::Float16, [2, 17, 4, 5]));
        select(&mut g, x, &[], &[(NC1HWC0, TypeId::Float16)]);
        let y = g.add_parameter("y", Abstract::tensor(TypeId::Float16, [4, 20, 40]));
        select(&mut g, y, &[], &[(DEFAULT, TypeId::Float16)]);
        let conv = g.add_cnode(
            Primitive::new("Conv2D"),
            vec![x, y],
            Some(Abstract::tensor(TypeId::Float16, [17])),
        );
        select(
            &mut g,
            conv,
            &[(NC1HWC0, TypeId::Float16), (FRACTAL_NZ, TypeId::Float16)],
            &[(NHWC, TypeId::Float16)],
        );

        assert_eq!(get_output_device_shape(&g, x, 0).unwrap(), [2, 2, 4, 5, 16]);
        assert_eq!(get_input_device_shape(&g, conv, 0).unwrap(), [2, 2, 4, 5, 16]);
        assert_eq!(get_input_device_shape(&g, conv, 1).unwrap(), [4, 3, 2, 16, 16]);
        // 输入 1 的来源仍按自己的默认格式排布
        assert_eq!(get_prev_node_output_device_shape(&g, conv, 1).unwrap(), [4, 20, 40]);
        // [17] 补齐为 [1,17,1,1] 后重排
        assert_eq!(get_output_device_shape(&g, conv, 0).unwrap(), [1, 1, 1, 17]);
    }

    #[test]
    fn test_scalar_shape() {
        let mut g = KernelGraph::new(0, "Ascend");
        let s = g.add_parameter("s", Abstract::tensor(TypeId::Float32, [0i64; 0]));
        select(&mut g, s, &[], &[(NC1HWC0, TypeId::Float32)]);
        assert!(get_output_device_shape(&g, s, 0).unwrap().is_empty());
    }
}
