use crate::{
    invalid_shape,
    ir::{BaseShape, ObjectType, Type, Value},
    null_collaborator, sync_failed, unsupported_type, Blob, FatalError, QueueAlloc,
};
use ::common::{is_dynamic_shape, static_count, TypeId, UNKNOWN_DIM};
use log::{error, warn};
use std::{any::Any, ffi::c_void, fmt, sync::Arc};

/// 核张量上附着的任意用户数据。
pub type UserData = Arc<dyn Any + Send + Sync>;

/// 设备到主机的同步器。
pub trait DeviceSynchronizer {
    /// 把 `device` 处的 `host.len()` 字节同步到 `host`，阻塞到完成。
    fn sync_device_to_host(
        &self,
        host: &mut [u8],
        device: *const c_void,
        format: &str,
        shape: &[i64],
        stream_id: u32,
    ) -> bool;
}

/// 构造核张量时附带的设备侧信息。
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub ptr: *mut c_void,
    pub size: usize,
    pub format: String,
    pub dtype: TypeId,
    pub host_shape: Vec<i64>,
    pub device_name: String,
    pub device_id: u32,
    pub user_data: Option<UserData>,
}

impl DeviceInfo {
    pub fn new(ptr: *mut c_void, size: usize, format: impl Into<String>, dtype: TypeId) -> Self {
        Self {
            ptr,
            size,
            format: format.into(),
            dtype,
            host_shape: vec![],
            device_name: String::new(),
            device_id: 0,
            user_data: None,
        }
    }
}

/// 核函数的一个输入或输出。
///
/// 同时描述逻辑上的形状、类型、值和物理上的存储。
/// 克隆时形状和类型深拷贝，设备指针和用户数据浅拷贝，设备存储不会因克隆而复制。
#[derive(Clone)]
pub struct KernelTensor {
    shape: BaseShape,
    ty: Type,
    object_type: ObjectType,
    value: Value,
    shape_vector: Vec<i64>,
    host_shape: Vec<i64>,
    dtype: TypeId,
    element_size: usize,
    format: String,
    padding_type: String,
    device_ptr: *mut c_void,
    size: usize,
    device_name: String,
    device_id: u32,
    stream_id: u32,
    host_data: Option<Blob>,
    user_data: Option<UserData>,
    device_synchronizer: Option<Arc<dyn DeviceSynchronizer>>,
}

impl KernelTensor {
    /// 由形状、类型和值构造主机侧描述，并按形状计算存储大小。
    pub fn new(shape: BaseShape, ty: Type, value: Value) -> Result<Self, FatalError> {
        let mut ans = Self {
            shape: BaseShape::NoShape,
            ty: Type::None,
            object_type: ObjectType::Unknown,
            value,
            shape_vector: vec![],
            host_shape: vec![],
            dtype: TypeId::Unknown,
            element_size: 0,
            format: crate::device::format::DEFAULT.into(),
            padding_type: String::new(),
            device_ptr: std::ptr::null_mut(),
            size: 0,
            device_name: String::new(),
            device_id: 0,
            stream_id: 0,
            host_data: None,
            user_data: None,
            device_synchronizer: None,
        };
        ans.set_type(ty)?;
        ans.set_shape(shape);
        Ok(ans)
    }

    /// 构造带有设备存储的核张量，存储大小以 `info` 为准。
    pub fn with_device_info(
        shape: BaseShape,
        ty: Type,
        value: Value,
        info: DeviceInfo,
    ) -> Result<Self, FatalError> {
        let mut ans = Self::new(shape, ty, value)?;
        if !ans.dtype.is_valid() {
            ans.dtype = info.dtype;
            ans.element_size = info.dtype.size();
        }
        ans.device_ptr = info.ptr;
        ans.size = info.size;
        ans.format = info.format;
        ans.host_shape = info.host_shape;
        ans.device_name = info.device_name;
        ans.device_id = info.device_id;
        ans.user_data = info.user_data;
        Ok(ans)
    }

    #[inline]
    pub fn shape(&self) -> &BaseShape {
        &self.shape
    }

    /// 设置形状，按对象类型重算形状向量和存储大小。
    pub fn set_shape(&mut self, shape: BaseShape) {
        self.shape_vector = match self.object_type {
            ObjectType::Tensor => shape.shape_vector().to_vec(),
            ObjectType::Tuple | ObjectType::List => match &shape {
                BaseShape::DynamicSequence(_) => vec![UNKNOWN_DIM],
                BaseShape::Tuple(elements) | BaseShape::List(elements) => {
                    let mut vec = vec![elements.len() as i64];
                    if let Some(BaseShape::Shape(first)) = elements.first() {
                        vec.extend_from_slice(&first.dims)
                    }
                    vec
                }
                _ => vec![],
            },
            _ => vec![],
        };
        self.shape = shape;
        self.calculate_mem_size()
    }

    #[inline]
    pub fn shape_vector(&self) -> &[i64] {
        &self.shape_vector
    }

    /// 替换张量的形状向量，只对张量对象有效。
    pub fn set_shape_vector(&mut self, dims: Vec<i64>) -> Result<(), FatalError> {
        if self.object_type != ObjectType::Tensor {
            return Err(unsupported_type(format!(
                "set shape vector on {:?} object",
                self.object_type
            )));
        }
        self.shape.set_shape_vector(&dims);
        self.shape_vector = dims;
        self.calculate_mem_size();
        Ok(())
    }

    /// 张量形状的上界，没有上界时为空。
    #[inline]
    pub fn max_shape(&self) -> &[i64] {
        self.shape.as_shape().map_or(&[], |s| &s.max_shape)
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// 设置类型，推导元素类型和元素宽度。
    pub fn set_type(&mut self, ty: Type) -> Result<(), FatalError> {
        let object_type = ty.object_type();
        let dtype = match &ty {
            Type::Tensor(dt) | Type::Number(dt) => Some(*dt),
            Type::String => Some(TypeId::String),
            Type::Tuple(seq) | Type::List(seq) => {
                let element = if seq.dynamic_len {
                    seq.dynamic_element.as_deref()
                } else {
                    seq.elements.first()
                };
                match element {
                    // 空序列不改变元素类型
                    None => None,
                    Some(Type::Tensor(dt) | Type::Number(dt)) => Some(*dt),
                    Some(other) => {
                        return Err(unsupported_type(format!(
                            "sequence element of {:?} object",
                            other.object_type()
                        )))
                    }
                }
            }
            _ => {
                return Err(unsupported_type(format!(
                    "kernel tensor of {object_type:?} object"
                )))
            }
        };
        if let Some(dt) = dtype {
            self.dtype = dt;
            self.element_size = dt.size();
        }
        self.object_type = object_type;
        self.ty = ty;
        Ok(())
    }

    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    #[inline]
    pub fn dtype_id(&self) -> TypeId {
        self.dtype
    }

    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn set_value(&mut self, value: Value) {
        self.value = value
    }

    /// 按形状向量重算存储大小，动态形状的大小为 0。
    pub fn calculate_mem_size(&mut self) {
        self.size = if self.object_type == ObjectType::Number {
            self.element_size
        } else {
            static_count(&self.shape_vector).map_or(0, |n| n.saturating_mul(self.element_size))
        }
    }

    /// 完全确定的形状对应的字节数。
    pub fn size_in_bytes(&self) -> Result<usize, FatalError> {
        let unit = self.dtype.size();
        if self.shape_vector.is_empty() {
            return Ok(unit);
        }
        let mut ans = unit;
        for &d in &self.shape_vector {
            if d < 0 {
                return Err(invalid_shape(format!(
                    "negative dimension in {:?}",
                    self.shape_vector
                )));
            }
            if d == 0 {
                warn!("shape {:?} has zero dimension", self.shape_vector)
            }
            ans = ans
                .checked_mul(d as usize)
                .ok_or_else(|| invalid_shape(format!("{:?} overflows", self.shape_vector)))?
        }
        Ok(ans)
    }

    #[inline]
    pub fn is_dynamic_shape(&self) -> bool {
        is_dynamic_shape(&self.shape_vector)
    }

    #[inline]
    pub fn host_shape(&self) -> &[i64] {
        &self.host_shape
    }

    #[inline]
    pub fn set_host_shape(&mut self, shape: Vec<i64>) {
        self.host_shape = shape
    }

    #[inline]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[inline]
    pub fn set_format(&mut self, format: impl Into<String>) {
        self.format = format.into()
    }

    #[inline]
    pub fn padding_type(&self) -> &str {
        &self.padding_type
    }

    #[inline]
    pub fn set_padding_type(&mut self, padding_type: impl Into<String>) {
        self.padding_type = padding_type.into()
    }

    #[inline]
    pub fn device_ptr(&self) -> *mut c_void {
        self.device_ptr
    }

    #[inline]
    pub fn set_device_ptr(&mut self, ptr: *mut c_void) {
        self.device_ptr = ptr
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn set_size(&mut self, size: usize) {
        self.size = size
    }

    #[inline]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    #[inline]
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    #[inline]
    pub fn set_device(&mut self, name: impl Into<String>, id: u32) {
        self.device_name = name.into();
        self.device_id = id
    }

    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    #[inline]
    pub fn set_stream_id(&mut self, id: u32) {
        self.stream_id = id
    }

    /// 主机侧数据，来自显式设置或设备同步。
    #[inline]
    pub fn host_data(&self) -> Option<&[u8]> {
        self.host_data.as_deref()
    }

    #[inline]
    pub fn set_host_data(&mut self, data: Blob) {
        self.host_data = Some(data)
    }

    /// 将值或主机数据读出为 int64 序列。
    pub fn value_as_i64s(&self) -> Option<Vec<i64>> {
        match &self.value {
            Value::Int(v) => return Some(vec![*v]),
            Value::Sequence(items) => return items.iter().map(Value::as_int).collect(),
            Value::Tensor(t) => return t.to_i64s(),
            _ => {}
        }
        let data = self.host_data.as_deref()?;
        match self.dtype {
            TypeId::Int64 => Some(
                data.chunks_exact(size_of::<i64>())
                    .map(|b| i64::from_ne_bytes(b.try_into().unwrap()))
                    .collect(),
            ),
            TypeId::Int32 => Some(
                data.chunks_exact(size_of::<i32>())
                    .map(|b| i32::from_ne_bytes(b.try_into().unwrap()) as i64)
                    .collect(),
            ),
            _ => None,
        }
    }

    #[inline]
    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    #[inline]
    pub fn set_user_data(&mut self, data: UserData) {
        self.user_data = Some(data)
    }

    #[inline]
    pub fn set_device_synchronizer(&mut self, sync: Arc<dyn DeviceSynchronizer>) {
        self.device_synchronizer = Some(sync)
    }

    /// 从队列分配器申请存储并绑定到张量。
    ///
    /// 返回的存储对象持有所有权，必须比张量上的指针活得更久。
    pub fn bind_device_memory<QA: QueueAlloc>(&mut self, queue_alloc: &QA) -> QA::DevMem {
        let mut mem = queue_alloc.alloc(self.size);
        self.device_ptr = mem.as_mut_ptr().cast();
        mem
    }

    /// 把设备数据同步到主机数据，阻塞到完成。
    pub fn sync_data_from_device_to_host(&mut self) -> Result<(), FatalError> {
        if self.size == 0 {
            warn!("sync zero-sized kernel tensor from device");
            self.host_data = Some(Blob::new(0));
            return Ok(());
        }
        if self.device_ptr.is_null() {
            error!("device memory of kernel tensor is not allocated");
            return Err(sync_failed("device pointer is null"));
        }
        let Some(sync) = &self.device_synchronizer else {
            return Err(null_collaborator("device synchronizer is not set"));
        };
        let mut host = match self.host_data.take() {
            Some(blob) if blob.len() == self.size => blob,
            _ => Blob::new(self.size),
        };
        if !sync.sync_device_to_host(
            &mut host,
            self.device_ptr,
            &self.format,
            &self.shape_vector,
            self.stream_id,
        ) {
            error!("sync {} bytes from device failed", self.size);
            return Err(sync_failed(format!(
                "sync {} bytes from {:?}",
                self.size, self.device_ptr
            )));
        }
        self.host_data = Some(host);
        Ok(())
    }
}

impl fmt::Debug for KernelTensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KernelTensor")
            .field("shape", &self.shape_vector)
            .field("type", &self.ty)
            .field("format", &self.format)
            .field("device_ptr", &self.device_ptr)
            .field("size", &self.size)
            .field("device", &self.device_name)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{common_cpu::HostSynchronizer, FatalErrorKind};
    use rand::Rng;

    fn tensor(dtype: TypeId, dims: &[i64]) -> KernelTensor {
        KernelTensor::new(BaseShape::tensor(dims), Type::Tensor(dtype), Value::Any).unwrap()
    }

    #[test]
    fn test_size() {
        let mut t = tensor(TypeId::Float32, &[2, 3]);
        assert_eq!(t.size(), 24);
        assert_eq!(t.size_in_bytes().unwrap(), 24);

        t.set_shape_vector(vec![-1, 3]).unwrap();
        assert!(t.is_dynamic_shape());
        assert_eq!(t.size(), 0);
        assert_eq!(t.shape().shape_vector(), &[-1, 3]);
        assert_eq!(
            t.size_in_bytes().unwrap_err().kind,
            FatalErrorKind::InvalidShape
        );
    }

    #[test]
    fn test_random_static_size() {
        const DTYPES: [TypeId; 5] = [
            TypeId::Int8,
            TypeId::Float16,
            TypeId::Int32,
            TypeId::Float64,
            TypeId::Complex128,
        ];
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let dtype = DTYPES[rng.gen_range(0..DTYPES.len())];
            let rank = rng.gen_range(0..5);
            let dims = (0..rank).map(|_| rng.gen_range(0..8)).collect::<Vec<i64>>();
            let t = tensor(dtype, &dims);
            let expect = dtype.size() * dims.iter().product::<i64>() as usize;
            assert_eq!(t.size(), expect);
            assert_eq!(t.size_in_bytes().unwrap(), expect);
        }
    }

    #[test]
    fn test_sequence() {
        let ty = Type::tuple(vec![Type::Tensor(TypeId::Int64); 2]);
        let shape = BaseShape::Tuple(vec![BaseShape::tensor([3]); 2]);
        let t = KernelTensor::new(shape, ty, Value::Any).unwrap();
        assert_eq!(t.shape_vector(), &[2, 3]);
        assert_eq!(t.dtype_id(), TypeId::Int64);
        assert_eq!(t.size(), 48);

        let ty = Type::dynamic_tuple(Some(Type::Number(TypeId::Int32)));
        let t = KernelTensor::new(BaseShape::DynamicSequence(None), ty, Value::Any).unwrap();
        assert_eq!(t.shape_vector(), &[-1]);
        assert_eq!(t.dtype_id(), TypeId::Int32);
        assert_eq!(t.size(), 0);

        let t = KernelTensor::new(BaseShape::Tuple(vec![]), Type::tuple(vec![]), Value::Any);
        assert_eq!(t.unwrap().dtype_id(), TypeId::Unknown);
    }

    #[test]
    fn test_scalar() {
        let mut t = KernelTensor::new(
            BaseShape::NoShape,
            Type::Number(TypeId::Int32),
            Value::Int(7),
        )
        .unwrap();
        assert_eq!(t.size(), 4);
        assert_eq!(t.value_as_i64s(), Some(vec![7]));
        assert_eq!(
            t.set_shape_vector(vec![1]).unwrap_err().kind,
            FatalErrorKind::UnsupportedType
        );
    }

    #[test]
    fn test_unsupported_type() {
        let e = KernelTensor::new(BaseShape::NoShape, Type::Function, Value::Any).unwrap_err();
        assert_eq!(e.kind, FatalErrorKind::UnsupportedType);

        let nested = Type::tuple(vec![Type::tuple(vec![])]);
        let e = KernelTensor::new(BaseShape::NoShape, nested, Value::Any).unwrap_err();
        assert_eq!(e.kind, FatalErrorKind::UnsupportedType);
    }

    #[test]
    fn test_clone() {
        let mut mem = Blob::new(8);
        let mut t = tensor(TypeId::Int32, &[2]);
        t.set_device_ptr(mem.as_mut_ptr().cast());
        t.set_user_data(Arc::new(5u32));

        let mut copy = t.clone();
        copy.set_shape_vector(vec![4]).unwrap();
        assert_eq!(copy.device_ptr(), t.device_ptr());
        assert!(Arc::ptr_eq(copy.user_data().unwrap(), t.user_data().unwrap()));
        assert_eq!(t.shape_vector(), &[2]);
    }

    #[test]
    fn test_sync() {
        let mut device = Blob::from_slice(&[1, 0, 0, 0, 2, 0, 0, 0]);
        let mut t = tensor(TypeId::Int32, &[2]);
        assert_eq!(
            t.sync_data_from_device_to_host().unwrap_err().kind,
            FatalErrorKind::SyncFailed
        );

        t.set_device_ptr(device.as_mut_ptr().cast());
        assert_eq!(
            t.sync_data_from_device_to_host().unwrap_err().kind,
            FatalErrorKind::NullCollaborator
        );

        t.set_device_synchronizer(Arc::new(HostSynchronizer));
        t.sync_data_from_device_to_host().unwrap();
        assert_eq!(t.host_data(), Some(&device[..]));
        if cfg!(target_endian = "little") {
            assert_eq!(t.value_as_i64s(), Some(vec![1, 2]));
        }
    }
}
