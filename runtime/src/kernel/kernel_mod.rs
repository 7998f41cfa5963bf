use super::KernelTensor;
use crate::{
    resize_failed, unknown_out_shape, unknown_shape, FatalError, LaunchError, ResizeError,
    StreamPtr,
};
use ::common::{is_dynamic_shape, static_count, TypeId};
use log::debug;

/// 核函数支持的一组输入输出属性。
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct KernelAttr {
    inputs: Vec<(TypeId, String)>,
    outputs: Vec<(TypeId, String)>,
    skip_check: bool,
}

impl KernelAttr {
    #[inline]
    pub fn add_input_attr(mut self, dtype: TypeId, format: impl Into<String>) -> Self {
        self.inputs.push((dtype, format.into()));
        self
    }

    #[inline]
    pub fn add_output_attr(mut self, dtype: TypeId, format: impl Into<String>) -> Self {
        self.outputs.push((dtype, format.into()));
        self
    }

    /// 选核时不检查输入输出属性。
    #[inline]
    pub fn add_skip_check_attr(mut self, skip_check: bool) -> Self {
        self.skip_check = skip_check;
        self
    }

    #[inline]
    pub fn input_attrs(&self) -> &[(TypeId, String)] {
        &self.inputs
    }

    #[inline]
    pub fn output_attrs(&self) -> &[(TypeId, String)] {
        &self.outputs
    }

    #[inline]
    pub fn skip_check(&self) -> bool {
        self.skip_check
    }
}

/// 核模块的公共状态。
#[derive(Clone, Default, Debug)]
pub struct KernelModBase {
    pub kernel_name: String,
    pub input_size_list: Vec<usize>,
    pub output_size_list: Vec<usize>,
    pub workspace_size_list: Vec<usize>,
}

impl KernelModBase {
    #[inline]
    pub fn new(kernel_name: impl Into<String>) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            ..Default::default()
        }
    }

    /// 按输入输出的形状重算尺寸表。
    ///
    /// 输入形状未知时立即失败；输出形状未知时用上界或单个元素的宽度占位，
    /// 处理完所有输出后报告输出形状未知。
    pub fn resize(
        &mut self,
        inputs: &[&KernelTensor],
        outputs: &[&KernelTensor],
    ) -> Result<(), ResizeError> {
        self.input_size_list.clear();
        self.output_size_list.clear();
        self.workspace_size_list.clear();

        self.input_size_list = input_sizes(&self.kernel_name, inputs)?;

        let (sizes, known) = output_sizes(outputs)
            .map_err(|e| resize_failed(format!("{}: {}", self.kernel_name, e.info)))?;
        self.output_size_list = sizes;
        if known {
            Ok(())
        } else {
            Err(unknown_out_shape(format!(
                "{} has outputs of unknown shape",
                self.kernel_name
            )))
        }
    }
}

/// 计算输入的字节数。任一输入形状未知时失败。
pub fn input_sizes(kernel_name: &str, inputs: &[&KernelTensor]) -> Result<Vec<usize>, ResizeError> {
    let mut sizes = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let shape = input.shape_vector();
        if is_dynamic_shape(shape) {
            debug!("{kernel_name} input {i} has unknown shape {shape:?}");
            return Err(unknown_shape(format!("{kernel_name} input {i}: {shape:?}")));
        }
        let unit = input.dtype_id().size();
        let size = static_count(shape)
            .and_then(|n| n.checked_mul(unit))
            .ok_or_else(|| resize_failed(format!("{kernel_name} input {i} size overflows")))?;
        sizes.push(size.max(unit))
    }
    Ok(sizes)
}

/// 计算输出的字节数，同时报告所有输出的形状是否都已确定。
///
/// 形状未知的输出有上界时按上界计算，否则按单个元素计算。
pub fn output_sizes(outputs: &[&KernelTensor]) -> Result<(Vec<usize>, bool), ResizeError> {
    let mut known = true;
    let mut sizes = Vec::with_capacity(outputs.len());
    for (i, output) in outputs.iter().enumerate() {
        let unit = output.dtype_id().size();
        let mut shape = output.shape_vector();
        if is_dynamic_shape(shape) {
            known = false;
            shape = output.max_shape();
            if shape.is_empty() || is_dynamic_shape(shape) {
                sizes.push(unit);
                continue;
            }
        }
        let size = static_count(shape)
            .and_then(|n| n.checked_mul(unit))
            .ok_or_else(|| resize_failed(format!("output {i} size overflows")))?;
        sizes.push(size)
    }
    Ok((sizes, known))
}

/// 核模块。
///
/// 每个节点持有一个有状态的核模块。
/// `resize` 按本次的输入输出重算尺寸表，分配器据此准备存储，随后 `launch`。
pub trait KernelMod {
    fn base(&self) -> &KernelModBase;
    fn base_mut(&mut self) -> &mut KernelModBase;

    #[inline]
    fn kernel_name(&self) -> &str {
        &self.base().kernel_name
    }

    /// 核模块支持的属性组合。
    fn op_support(&self) -> Vec<KernelAttr> {
        vec![]
    }

    fn init(
        &mut self,
        _inputs: &[&KernelTensor],
        _outputs: &[&KernelTensor],
    ) -> Result<(), FatalError> {
        Ok(())
    }

    fn resize(
        &mut self,
        inputs: &[&KernelTensor],
        outputs: &[&KernelTensor],
    ) -> Result<(), ResizeError> {
        self.base_mut().resize(inputs, outputs)
    }

    fn launch(
        &self,
        inputs: &[&KernelTensor],
        workspaces: &[&KernelTensor],
        outputs: &[&KernelTensor],
        stream: StreamPtr,
    ) -> Result<(), LaunchError>;

    #[inline]
    fn input_size_list(&self) -> &[usize] {
        &self.base().input_size_list
    }

    #[inline]
    fn output_size_list(&self) -> &[usize] {
        &self.base().output_size_list
    }

    #[inline]
    fn workspace_size_list(&self) -> &[usize] {
        &self.base().workspace_size_list
    }

    /// 执行后才能确定输出形状。
    fn is_need_update_output_shape_and_size(&self) -> bool {
        false
    }
}
