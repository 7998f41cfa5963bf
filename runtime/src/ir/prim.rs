//! 运行时关心的原语名字。

pub const TUPLE_GET_ITEM: &str = "TupleGetItem";
pub const MAKE_TUPLE: &str = "MakeTuple";
pub const DEPEND: &str = "Depend";
pub const LOAD: &str = "Load";
pub const UPDATE_STATE: &str = "UpdateState";
pub const RETURN: &str = "Return";

pub const RESHAPE: &str = "Reshape";
pub const EXPAND_DIMS: &str = "ExpandDims";
pub const SQUEEZE: &str = "Squeeze";
pub const FLATTEN: &str = "Flatten";
pub const FLATTEN_GRAD: &str = "FlattenGrad";

pub const GET_NEXT: &str = "GetNext";
pub const STACK_INIT: &str = "StackInit";
pub const STACK_DESTROY: &str = "StackDestroy";
pub const STACK_POP: &str = "StackPop";
pub const STACK_PUSH: &str = "StackPush";

pub const REDUCE_SUM: &str = "ReduceSum";
pub const REDUCE_SUM_D: &str = "ReduceSumD";

pub const TUPLE_TO_TENSOR: &str = "TupleToTensor";
pub const SCALAR_TO_TENSOR: &str = "ScalarToTensor";
pub const TENSOR_TO_TUPLE: &str = "TensorToTuple";
pub const TENSOR_TO_SCALAR: &str = "TensorToScalar";
pub const REAL_MAKE_TUPLE: &str = "RealMakeTuple";
pub const REAL_TUPLE_GET_ITEM: &str = "RealTupleGetItem";
pub const TUPLE_SET_ITEM: &str = "TupleSetItem";

pub const SCALAR_SUMMARY: &str = "ScalarSummary";
pub const TENSOR_SUMMARY: &str = "TensorSummary";
pub const IMAGE_SUMMARY: &str = "ImageSummary";
pub const HISTOGRAM_SUMMARY: &str = "HistogramSummary";

/// 运行时可以直接复用输入内存的原语。
pub const NOP_OPS: [&str; 5] = [RESHAPE, EXPAND_DIMS, SQUEEZE, FLATTEN, FLATTEN_GRAD];

/// 在序列和张量、标量之间转换类型的原语。
pub const TYPE_TRANSFORM_OPS: [&str; 7] = [
    TUPLE_TO_TENSOR,
    SCALAR_TO_TENSOR,
    TENSOR_TO_TUPLE,
    TENSOR_TO_SCALAR,
    REAL_MAKE_TUPLE,
    REAL_TUPLE_GET_ITEM,
    TUPLE_SET_ITEM,
];

/// 即使输入都是常量也有顺序副作用的原语。
pub const ORDERED_AICPU_OPS: [&str; 5] = [GET_NEXT, STACK_INIT, STACK_DESTROY, STACK_POP, STACK_PUSH];

pub const SUMMARY_OPS: [&str; 4] = [SCALAR_SUMMARY, TENSOR_SUMMARY, IMAGE_SUMMARY, HISTOGRAM_SUMMARY];

#[inline]
pub fn is_type_transform_op(name: &str) -> bool {
    TYPE_TRANSFORM_OPS.contains(&name)
}
