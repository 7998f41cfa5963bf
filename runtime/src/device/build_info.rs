use super::format::{DEFAULT, INVALID};
use ::common::TypeId;
use std::sync::Arc;

/// 核函数对输入输出对象形式的约定。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub enum KernelObjectType {
    #[default]
    Unknown,
    Tensor,
    Scalar,
    Tuple,
    /// 展开为多个张量的元组。
    TupleUnfold,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum KernelType {
    #[default]
    Unknown,
    Aicpu,
    Tbe,
    Akg,
    Cpu,
    Gpu,
    Hccl,
    Rt,
    Host,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Processor {
    #[default]
    Unknown,
    Aicore,
    Aicpu,
    Cuda,
    Cpu,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum OpType {
    #[default]
    Unknown,
    Dynamic,
    Skip,
}

/// 选核得到的构建信息。
///
/// 记录每个输入和输出的格式、设备数据类型和对象类型。
/// 未选定的槽位报告 [`INVALID`] 格式和 [`TypeId::Unknown`] 类型。
#[derive(Clone, Default, PartialEq, Debug)]
pub struct KernelBuildInfo {
    kernel_type: KernelType,
    processor: Processor,
    op_type: OpType,
    core_type: String,
    fusion_type: String,
    origin_data_format: String,
    inputs_format: Vec<String>,
    outputs_format: Vec<String>,
    inputs_reshape_type: Vec<String>,
    outputs_reshape_type: Vec<String>,
    inputs_device_type: Vec<TypeId>,
    outputs_device_type: Vec<TypeId>,
    inputs_kernel_object_type: Vec<KernelObjectType>,
    outputs_kernel_object_type: Vec<KernelObjectType>,
    valid: bool,
}

impl KernelBuildInfo {
    #[inline]
    pub fn kernel_type(&self) -> KernelType {
        self.kernel_type
    }

    #[inline]
    pub fn processor(&self) -> Processor {
        self.processor
    }

    #[inline]
    pub fn op_type(&self) -> OpType {
        self.op_type
    }

    #[inline]
    pub fn core_type(&self) -> &str {
        &self.core_type
    }

    #[inline]
    pub fn fusion_type(&self) -> &str {
        &self.fusion_type
    }

    /// 选核前的原始数据格式，未记录时为默认格式。
    #[inline]
    pub fn origin_data_format(&self) -> &str {
        if self.origin_data_format.is_empty() {
            DEFAULT
        } else {
            &self.origin_data_format
        }
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn input_format(&self, i: usize) -> &str {
        self.inputs_format.get(i).map_or(INVALID, String::as_str)
    }

    #[inline]
    pub fn output_format(&self, i: usize) -> &str {
        self.outputs_format.get(i).map_or(INVALID, String::as_str)
    }

    #[inline]
    pub fn all_input_formats(&self) -> &[String] {
        &self.inputs_format
    }

    #[inline]
    pub fn all_output_formats(&self) -> &[String] {
        &self.outputs_format
    }

    #[inline]
    pub fn input_device_type(&self, i: usize) -> TypeId {
        self.inputs_device_type
            .get(i)
            .copied()
            .unwrap_or(TypeId::Unknown)
    }

    #[inline]
    pub fn output_device_type(&self, i: usize) -> TypeId {
        self.outputs_device_type
            .get(i)
            .copied()
            .unwrap_or(TypeId::Unknown)
    }

    #[inline]
    pub fn all_input_device_types(&self) -> &[TypeId] {
        &self.inputs_device_type
    }

    #[inline]
    pub fn all_output_device_types(&self) -> &[TypeId] {
        &self.outputs_device_type
    }

    #[inline]
    pub fn input_reshape_type(&self, i: usize) -> &str {
        self.inputs_reshape_type.get(i).map_or("", String::as_str)
    }

    #[inline]
    pub fn output_reshape_type(&self, i: usize) -> &str {
        self.outputs_reshape_type.get(i).map_or("", String::as_str)
    }

    #[inline]
    pub fn input_kernel_object_types(&self) -> &[KernelObjectType] {
        &self.inputs_kernel_object_type
    }

    #[inline]
    pub fn output_kernel_object_types(&self) -> &[KernelObjectType] {
        &self.outputs_kernel_object_type
    }

    #[inline]
    pub fn output_kernel_object_type(&self, i: usize) -> Option<KernelObjectType> {
        self.outputs_kernel_object_type.get(i).copied()
    }

    /// 声明的输出个数。
    #[inline]
    pub fn output_num(&self) -> usize {
        self.outputs_device_type.len()
    }

    #[inline]
    pub fn input_num(&self) -> usize {
        self.inputs_device_type.len()
    }
}

/// 构建信息的构造器，可以从已有信息开始修改。
#[derive(Clone, Default, Debug)]
pub struct KernelBuildInfoBuilder(KernelBuildInfo);

macro_rules! setter {
    ($name:ident: $field:ident $ty:ty) => {
        #[inline]
        pub fn $name(mut self, value: $ty) -> Self {
            self.0.$field = value;
            self
        }
    };
}

impl KernelBuildInfoBuilder {
    #[inline]
    pub fn new() -> Self {
        Self(KernelBuildInfo {
            valid: true,
            ..Default::default()
        })
    }

    #[inline]
    pub fn from_info(info: &KernelBuildInfo) -> Self {
        Self(info.clone())
    }

    setter!(kernel_type:                kernel_type                KernelType           );
    setter!(processor:                  processor                  Processor            );
    setter!(op_type:                    op_type                    OpType               );
    setter!(core_type:                  core_type                  String               );
    setter!(fusion_type:                fusion_type                String               );
    setter!(origin_data_format:         origin_data_format         String               );
    setter!(inputs_reshape_type:        inputs_reshape_type        Vec<String>          );
    setter!(outputs_reshape_type:       outputs_reshape_type       Vec<String>          );
    setter!(inputs_device_type:         inputs_device_type         Vec<TypeId>          );
    setter!(outputs_device_type:        outputs_device_type        Vec<TypeId>          );
    setter!(inputs_kernel_object_type:  inputs_kernel_object_type  Vec<KernelObjectType>);
    setter!(outputs_kernel_object_type: outputs_kernel_object_type Vec<KernelObjectType>);
    setter!(valid:                      valid                      bool                 );

    #[inline]
    pub fn inputs_format<S: Into<String>>(mut self, formats: impl IntoIterator<Item = S>) -> Self {
        self.0.inputs_format = formats.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn outputs_format<S: Into<String>>(mut self, formats: impl IntoIterator<Item = S>) -> Self {
        self.0.outputs_format = formats.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn build(self) -> Arc<KernelBuildInfo> {
        Arc::new(self.0)
    }
}
