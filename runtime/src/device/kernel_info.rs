use super::{AddressId, KernelBuildInfo};
use crate::kernel::{KernelMod, KernelTensor};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// 节点的核信息。
///
/// 记录选核结果、输出和工作空间的设备地址、核模块以及调度元数据。
/// 节点至多持有一份核信息，首次访问时创建。
#[derive(Default)]
pub struct KernelInfo {
    build_info: Option<Arc<KernelBuildInfo>>,
    kernel_mod: Option<Box<dyn KernelMod>>,
    output_address: Vec<Option<AddressId>>,
    workspace_address: Vec<Option<AddressId>>,
    output_kernel_tensors: Vec<Option<KernelTensor>>,
    out_in_ref_map: BTreeMap<usize, usize>,
    stream_id: u32,
    stream_distinction_label: u32,
    graph_id: u32,
    is_feature_map: bool,
}

#[inline]
fn slot<T: Copy>(list: &[Option<T>], i: usize) -> Option<T> {
    list.get(i).copied().flatten()
}

impl KernelInfo {
    #[inline]
    pub fn has_build_info(&self) -> bool {
        self.build_info.is_some()
    }

    #[inline]
    pub fn build_info(&self) -> Option<&Arc<KernelBuildInfo>> {
        self.build_info.as_ref()
    }

    #[inline]
    pub fn set_build_info(&mut self, info: Option<Arc<KernelBuildInfo>>) {
        self.build_info = info
    }

    #[inline]
    pub fn kernel_mod(&self) -> Option<&dyn KernelMod> {
        self.kernel_mod.as_deref()
    }

    #[inline]
    pub fn kernel_mod_mut(&mut self) -> Option<&mut (dyn KernelMod + 'static)> {
        self.kernel_mod.as_deref_mut()
    }

    /// 设置核模块，并按核模块的输出个数预留输出地址槽位。
    pub fn set_kernel_mod(&mut self, kernel_mod: Box<dyn KernelMod>) {
        let n = kernel_mod.output_size_list().len();
        if self.output_address.len() < n {
            self.output_address.resize(n, None)
        }
        self.kernel_mod = Some(kernel_mod)
    }

    #[inline]
    pub fn take_kernel_mod(&mut self) -> Option<Box<dyn KernelMod>> {
        self.kernel_mod.take()
    }

    #[inline]
    pub fn output_addr(&self, i: usize) -> Option<AddressId> {
        slot(&self.output_address, i)
    }

    #[inline]
    pub fn output_addr_exist(&self, i: usize) -> bool {
        self.output_addr(i).is_some()
    }

    #[inline]
    pub fn output_address_list(&self) -> &[Option<AddressId>] {
        &self.output_address
    }

    /// 设置输出地址。
    ///
    /// 没有核模块的节点（参数和值节点）按需扩展槽位；
    /// 有核模块的节点槽位数已经确定，越界时返回 `false`。
    pub fn set_output_addr(&mut self, address: Option<AddressId>, i: usize) -> bool {
        if i >= self.output_address.len() {
            if self.kernel_mod.is_some() {
                return false;
            }
            self.output_address.resize(i + 1, None)
        }
        self.output_address[i] = address;
        true
    }

    #[inline]
    pub fn workspace_addr(&self, i: usize) -> Option<AddressId> {
        slot(&self.workspace_address, i)
    }

    #[inline]
    pub fn workspace_addr_exist(&self, i: usize) -> bool {
        self.workspace_addr(i).is_some()
    }

    #[inline]
    pub fn workspace_address_list(&self) -> &[Option<AddressId>] {
        &self.workspace_address
    }

    pub fn set_workspace_addr(&mut self, address: Option<AddressId>, i: usize) -> bool {
        if i >= self.workspace_address.len() {
            self.workspace_address.resize(i + 1, None)
        }
        self.workspace_address[i] = address;
        true
    }

    #[inline]
    pub fn output_kernel_tensor(&self, i: usize) -> Option<&KernelTensor> {
        self.output_kernel_tensors.get(i).and_then(Option::as_ref)
    }

    #[inline]
    pub fn output_kernel_tensor_mut(&mut self, i: usize) -> Option<&mut KernelTensor> {
        self.output_kernel_tensors.get_mut(i).and_then(Option::as_mut)
    }

    #[inline]
    pub fn output_kernel_tensor_exist(&self, i: usize) -> bool {
        self.output_kernel_tensor(i).is_some()
    }

    pub fn set_output_kernel_tensor(&mut self, tensor: KernelTensor, i: usize) {
        if i >= self.output_kernel_tensors.len() {
            self.output_kernel_tensors.resize_with(i + 1, || None)
        }
        self.output_kernel_tensors[i] = Some(tensor)
    }

    /// 输出序号到输入序号的原地更新关系。
    #[inline]
    pub fn out_in_ref_map(&self) -> &BTreeMap<usize, usize> {
        &self.out_in_ref_map
    }

    #[inline]
    pub fn add_ref_map(&mut self, output: usize, input: usize) {
        self.out_in_ref_map.insert(output, input);
    }

    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    #[inline]
    pub fn set_stream_id(&mut self, id: u32) {
        self.stream_id = id
    }

    #[inline]
    pub fn stream_distinction_label(&self) -> u32 {
        self.stream_distinction_label
    }

    #[inline]
    pub fn set_stream_distinction_label(&mut self, label: u32) {
        self.stream_distinction_label = label
    }

    #[inline]
    pub fn graph_id(&self) -> u32 {
        self.graph_id
    }

    #[inline]
    pub fn set_graph_id(&mut self, id: u32) {
        self.graph_id = id
    }

    #[inline]
    pub fn is_feature_map(&self) -> bool {
        self.is_feature_map
    }

    #[inline]
    pub fn set_feature_map_flag(&mut self, flag: bool) {
        self.is_feature_map = flag
    }
}

impl fmt::Debug for KernelInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KernelInfo")
            .field("build_info", &self.build_info)
            .field(
                "kernel_mod",
                &self.kernel_mod.as_ref().map(|k| k.kernel_name().to_string()),
            )
            .field("output_address", &self.output_address)
            .field("workspace_address", &self.workspace_address)
            .field("stream_id", &self.stream_id)
            .field("graph_id", &self.graph_id)
            .field("is_feature_map", &self.is_feature_map)
            .finish()
    }
}
