use super::{input_sizes, output_sizes, KernelAttr, KernelMod, KernelModBase, KernelTensor, SymbolEngine};
use crate::{
    anf_algo, args_not_support, execution_failed, invalid_node,
    ir::{Abstract, BaseShape, KernelGraph, NodeId, ObjectType, Value},
    null_collaborator, resize_failed, unknown_out_shape, Blob, FatalError, LaunchError,
    ResizeError, StreamPtr,
};
use log::{debug, error};
use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::c_void,
    fmt,
    sync::Arc,
};

/// 异步拷贝回调：`(dst, src, size, stream)`，成功时返回 `true`。
pub type MemcpyAsync = Arc<dyn Fn(*mut c_void, *const c_void, usize, StreamPtr) -> bool>;

/// 把值转换为形状列表。
///
/// 接受整数、整数序列、嵌套的整数序列和整数张量，其他值返回 [None]。
pub fn value_to_shape(value: &Value) -> Option<Vec<Vec<i64>>> {
    match value {
        Value::Int(v) => Some(vec![vec![*v]]),
        Value::Sequence(items) => match items.first() {
            None => Some(vec![vec![]]),
            Some(Value::Int(_)) => items
                .iter()
                .map(Value::as_int)
                .collect::<Option<Vec<_>>>()
                .map(|shape| vec![shape]),
            Some(Value::Sequence(_)) => {
                let mut ans = vec![];
                for item in items {
                    ans.extend(value_to_shape(item)?)
                }
                Some(ans)
            }
            Some(_) => None,
        },
        Value::Tensor(t) => t.to_i64s().map(|shape| vec![shape]),
        _ => None,
    }
}

/// 值需要从符号引擎查询的输入。
struct ShapeSource {
    node: NodeId,
    abs: Arc<Abstract>,
    output_index: usize,
    debug_info: String,
}

/// 核包。
///
/// 包装一个输出形状依赖上游张量值的核模块。
/// 重算时从符号引擎查询这些值，写入缓存的输入张量，
/// 并把形状数据作为工作空间在发射前拷贝到设备。
pub struct KernelPacketKernelMod {
    base: KernelModBase,
    real_node_name: String,
    real_kernel_mod: Box<dyn KernelMod>,
    symbol_engine: Arc<dyn SymbolEngine>,
    memcpy_async: MemcpyAsync,
    inputs_cache: Vec<KernelTensor>,
    /// 内部输入序号到外部图输入序号。
    input_map: BTreeMap<usize, usize>,
    input_shape_map: BTreeMap<usize, ShapeSource>,
    /// 依赖常量值节点，直接使用缓存的张量。
    skipped_inputs: BTreeSet<usize>,
    input_workspace_map: BTreeMap<usize, usize>,
    shape_cache: BTreeMap<usize, Vec<i64>>,
}

impl KernelPacketKernelMod {
    /// 为图中的真实节点构造核包，接管节点上的核模块。
    ///
    /// 每个输入都必须是图参数、需要查询值的输入或常量值节点之一。
    pub fn new(
        graph: &mut KernelGraph,
        real_node: NodeId,
        memcpy_async: MemcpyAsync,
    ) -> Result<Self, FatalError> {
        let real_node_name = graph.node(real_node).debug_string();
        let symbol_engine = graph
            .symbol_engine()
            .cloned()
            .ok_or_else(|| null_collaborator("graph has no symbol engine").at(&real_node_name))?;

        let inputs_cache = anf_algo::get_or_create_all_input_kernel_tensors(graph, real_node)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        let mut input_map = BTreeMap::new();
        let mut input_shape_map = BTreeMap::new();
        let mut skipped_inputs = BTreeSet::new();
        for i in 0..anf_algo::input_tensor_num(graph, real_node) {
            let (prev, output_index) = anf_algo::get_prev_node_output(graph, real_node, i)?;
            if let Some(pos) = graph.parameters().iter().position(|&p| p == prev) {
                debug!("{real_node_name} input {i} is graph input {pos}");
                input_map.insert(i, pos);
                continue;
            }

            let prev_node = graph.node(prev);
            if !symbol_engine.is_depend_value(prev) {
                match prev_node.value() {
                    Some(value) if !value.is_any() => {
                        debug!("{real_node_name} input {i} is const value, skipped");
                        skipped_inputs.insert(i);
                        continue;
                    }
                    Some(_) => {
                        return Err(invalid_node(format!("input {i} is ValueAny")).at(real_node_name))
                    }
                    None => {
                        return Err(invalid_node(format!(
                            "input {i} from {} is not supported",
                            prev_node.debug_string()
                        ))
                        .at(real_node_name))
                    }
                }
            }

            let abs = prev_node.abstract_().cloned().ok_or_else(|| {
                null_collaborator(format!("abstract of {}", prev_node.debug_string()))
                    .at(&real_node_name)
            })?;
            debug!(
                "{real_node_name} input {i} depends on value of {}",
                prev_node.debug_string()
            );
            input_shape_map.insert(
                i,
                ShapeSource {
                    node: prev,
                    abs,
                    output_index,
                    debug_info: prev_node.debug_string(),
                },
            );
        }

        let real_kernel_mod = graph
            .node_mut(real_node)
            .kernel_info_mut()
            .ok_or_else(|| null_collaborator("kernel info").at(&real_node_name))?
            .take_kernel_mod()
            .ok_or_else(|| null_collaborator("kernel mod").at(&real_node_name))?;

        Ok(Self {
            base: KernelModBase::new(format!("KernelPacket_{}", real_kernel_mod.kernel_name())),
            real_node_name,
            real_kernel_mod,
            symbol_engine,
            memcpy_async,
            inputs_cache,
            input_map,
            input_shape_map,
            skipped_inputs,
            input_workspace_map: BTreeMap::new(),
            shape_cache: BTreeMap::new(),
        })
    }

    #[inline]
    pub fn real_kernel_mod(&self) -> &dyn KernelMod {
        &*self.real_kernel_mod
    }

    #[inline]
    pub fn input_map(&self) -> &BTreeMap<usize, usize> {
        &self.input_map
    }

    #[inline]
    pub fn input_workspace_map(&self) -> &BTreeMap<usize, usize> {
        &self.input_workspace_map
    }

    #[inline]
    pub fn shape_cache(&self) -> &BTreeMap<usize, Vec<i64>> {
        &self.shape_cache
    }

    #[inline]
    pub fn is_shape_input(&self, i: usize) -> bool {
        self.input_shape_map.contains_key(&i)
    }

    #[inline]
    pub fn is_skipped_input(&self, i: usize) -> bool {
        self.skipped_inputs.contains(&i)
    }

    /// 组装内部核的输入：图输入来自外部，形状输入来自工作空间，其余使用缓存。
    fn inner_inputs<'a>(
        &'a self,
        inputs: &[&'a KernelTensor],
        workspaces: &[&'a KernelTensor],
    ) -> Result<Vec<&'a KernelTensor>, LaunchError> {
        (0..self.inputs_cache.len())
            .map(|i| {
                if let Some(&j) = self.input_map.get(&i) {
                    inputs.get(j).copied().ok_or_else(|| {
                        args_not_support(format!("input {j} of {} is missing", self.real_node_name))
                    })
                } else if let Some(&j) = self.input_workspace_map.get(&i) {
                    workspaces.get(j).copied().ok_or_else(|| {
                        args_not_support(format!(
                            "workspace {j} of {} is missing",
                            self.real_node_name
                        ))
                    })
                } else {
                    Ok(&self.inputs_cache[i])
                }
            })
            .collect()
    }
}

impl KernelMod for KernelPacketKernelMod {
    #[inline]
    fn base(&self) -> &KernelModBase {
        &self.base
    }

    #[inline]
    fn base_mut(&mut self) -> &mut KernelModBase {
        &mut self.base
    }

    fn op_support(&self) -> Vec<KernelAttr> {
        vec![KernelAttr::default().add_skip_check_attr(true)]
    }

    /// 重算尺寸表。失败时不改变任何状态，调用者可以在上游执行后重试。
    fn resize(
        &mut self,
        inputs: &[&KernelTensor],
        outputs: &[&KernelTensor],
    ) -> Result<(), ResizeError> {
        let input_size_list = input_sizes(&self.base.kernel_name, inputs)?;
        let (output_size_list, known) = output_sizes(outputs)?;
        if !known {
            return Err(unknown_out_shape(format!(
                "{} has outputs of unknown shape",
                self.real_node_name
            )));
        }

        let mut staged = BTreeMap::new();
        let mut shape_cache = BTreeMap::new();
        let mut input_workspace_map = BTreeMap::new();
        let mut workspace_size_list = vec![];
        for (&i, src) in &self.input_shape_map {
            let value = match self.symbol_engine.query_value(src.node, &src.abs) {
                Some(v) if !v.is_any() => v,
                _ => {
                    error!(
                        "input {i} of {}: value of {} is unknown",
                        self.real_node_name, src.debug_info
                    );
                    return Err(resize_failed(format!(
                        "input {i} of {} is unknown",
                        self.real_node_name
                    )));
                }
            };
            debug!("input {i} of {} is {value:?}", self.real_node_name);

            let mut tensor = self.inputs_cache[i].clone();
            let Some(shapes) = value_to_shape(&value) else {
                tensor.set_value(value);
                staged.insert(i, tensor);
                continue;
            };
            let Some(shape) = shapes.get(src.output_index) else {
                error!(
                    "output {} of {} is out of range {}",
                    src.output_index,
                    src.debug_info,
                    shapes.len()
                );
                return Err(resize_failed(format!(
                    "input {i} of {} is out of range",
                    self.real_node_name
                )));
            };

            let len = shape.len();
            match tensor.object_type() {
                ObjectType::Tensor => tensor
                    .set_shape_vector(vec![len as i64])
                    .map_err(|e| resize_failed(e.info))?,
                ObjectType::Tuple => tensor.set_shape(BaseShape::Tuple(vec![BaseShape::NoShape; len])),
                ObjectType::List => tensor.set_shape(BaseShape::List(vec![BaseShape::NoShape; len])),
                _ => {}
            }
            let bytes = shape.iter().flat_map(|d| d.to_ne_bytes()).collect::<Vec<_>>();
            tensor.set_value(Value::from(&shape[..]));
            tensor.set_host_data(Blob::from_slice(&bytes));

            input_workspace_map.insert(i, workspace_size_list.len());
            workspace_size_list.push(bytes.len());
            shape_cache.insert(i, shape.clone());
            staged.insert(i, tensor);
        }

        let inner_inputs = (0..self.inputs_cache.len())
            .map(|i| match self.input_map.get(&i) {
                Some(&j) => inputs.get(j).copied().ok_or_else(|| {
                    resize_failed(format!("input {j} of {} is missing", self.real_node_name))
                }),
                None => Ok(staged.get(&i).unwrap_or(&self.inputs_cache[i])),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.real_kernel_mod.resize(&inner_inputs, outputs)?;
        drop(inner_inputs);

        workspace_size_list.extend_from_slice(self.real_kernel_mod.workspace_size_list());
        for (i, tensor) in staged {
            self.inputs_cache[i] = tensor
        }
        self.base.input_size_list = input_size_list;
        self.base.output_size_list = output_size_list;
        self.base.workspace_size_list = workspace_size_list;
        self.input_workspace_map = input_workspace_map;
        self.shape_cache = shape_cache;
        Ok(())
    }

    fn launch(
        &self,
        inputs: &[&KernelTensor],
        workspaces: &[&KernelTensor],
        outputs: &[&KernelTensor],
        stream: StreamPtr,
    ) -> Result<(), LaunchError> {
        for (&i, &j) in &self.input_workspace_map {
            let Some(workspace) = workspaces.get(j) else {
                error!("workspace {j} of {} is missing", self.real_node_name);
                return Err(args_not_support(format!(
                    "workspace {j} out of range {}",
                    workspaces.len()
                )));
            };
            let Some(shape) = self.shape_cache.get(&i) else {
                return Err(args_not_support(format!("shape of input {i} is not cached")));
            };
            let size = size_of_val(&shape[..]);
            if workspace.size() != size {
                error!(
                    "workspace {j} of {} has {} bytes, shape of input {i} needs {size}",
                    self.real_node_name,
                    workspace.size()
                );
                return Err(args_not_support(format!(
                    "workspace {j} size {} mismatches {size}",
                    workspace.size()
                )));
            }
            if !(self.memcpy_async)(workspace.device_ptr(), shape.as_ptr().cast(), size, stream) {
                error!(
                    "copy shape of input {i} to workspace {j} of {} failed",
                    self.real_node_name
                );
                return Err(execution_failed(format!("memcpy to workspace {j}")));
            }
        }

        let inner_inputs = self.inner_inputs(inputs, workspaces)?;
        let inner_workspaces = workspaces.get(self.shape_cache.len()..).unwrap_or(&[]);
        debug!(
            "launch {} with {} inputs and {} workspaces",
            self.real_node_name,
            inner_inputs.len(),
            inner_workspaces.len()
        );
        self.real_kernel_mod
            .launch(&inner_inputs, inner_workspaces, outputs, stream)
            .inspect_err(|e| error!("launch {} failed: {e}", self.real_node_name))
    }
}

impl fmt::Debug for KernelPacketKernelMod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KernelPacketKernelMod")
            .field("real_node", &self.real_node_name)
            .field("input_map", &self.input_map)
            .field("shape_inputs", &self.input_shape_map.keys().collect::<Vec<_>>())
            .field("skipped_inputs", &self.skipped_inputs)
            .field("workspace", &self.base.workspace_size_list)
            .finish()
    }
}
