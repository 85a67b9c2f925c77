use std::fmt::Debug;

use half::{bf16, f16};

use crate::{BufferType, Error, Shape};

/// Rust type that can be stored in a [`Literal`]. Each native type corresponds to exactly one [`BufferType`] and is
/// stored in host memory using its native-endian byte representation.
pub trait NativeType: Copy + Debug + Send + Sync + 'static {
    /// [`BufferType`] that corresponds to this native type.
    const BUFFER_TYPE: BufferType;

    /// Number of bytes that a single value of this type occupies in a [`Literal`].
    const SIZE_IN_BYTES: usize;

    /// Writes this value into `bytes`, which must be exactly [`NativeType::SIZE_IN_BYTES`] long.
    fn write_bytes(&self, bytes: &mut [u8]);

    /// Reads a value from `bytes`, which must be exactly [`NativeType::SIZE_IN_BYTES`] long.
    fn read_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_native_type {
    ($ty:ty, $buffer_type:expr) => {
        impl NativeType for $ty {
            const BUFFER_TYPE: BufferType = $buffer_type;
            const SIZE_IN_BYTES: usize = size_of::<$ty>();

            fn write_bytes(&self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_ne_bytes());
            }

            fn read_bytes(bytes: &[u8]) -> Self {
                let mut value = [0u8; size_of::<$ty>()];
                value.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(value)
            }
        }
    };
}

impl_native_type!(i8, BufferType::I8);
impl_native_type!(i16, BufferType::I16);
impl_native_type!(i32, BufferType::I32);
impl_native_type!(i64, BufferType::I64);
impl_native_type!(u8, BufferType::U8);
impl_native_type!(u16, BufferType::U16);
impl_native_type!(u32, BufferType::U32);
impl_native_type!(u64, BufferType::U64);
impl_native_type!(bf16, BufferType::BF16);
impl_native_type!(f16, BufferType::F16);
impl_native_type!(f32, BufferType::F32);
impl_native_type!(f64, BufferType::F64);

impl NativeType for bool {
    const BUFFER_TYPE: BufferType = BufferType::Predicate;
    const SIZE_IN_BYTES: usize = 1;

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0] = *self as u8;
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Host-resident array: a [`Shape`] paired with the raw bytes of the array's elements in dense row-major order.
/// Literals are what gets copied into device buffers and what device buffers get copied back into.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    shape: Shape,
    data: Vec<u8>,
}

impl Literal {
    /// Creates a new zero-filled [`Literal`] with the provided [`Shape`].
    pub fn new(shape: Shape) -> Result<Self, Error> {
        let size = shape.size_in_bytes()?;
        Ok(Self { shape, data: vec![0; size] })
    }

    /// Creates a new [`Literal`] with the provided [`Shape`] that takes ownership of `data`. The number of bytes in
    /// `data` must match [`Shape::size_in_bytes`].
    pub fn from_bytes(shape: Shape, data: Vec<u8>) -> Result<Self, Error> {
        let size = shape.size_in_bytes()?;
        if data.len() != size {
            return Err(Error::invalid_argument(format!(
                "expected {size} byte(s) for a literal with shape '{shape}' but got {}",
                data.len(),
            )));
        }
        Ok(Self { shape, data })
    }

    /// Creates a new [`Literal`] with the provided dimension sizes that contains `values` in row-major order.
    pub fn from_values<T: NativeType, D: Into<Vec<u64>>>(dimensions: D, values: &[T]) -> Result<Self, Error> {
        let shape = Shape::new(T::BUFFER_TYPE, dimensions);
        let element_count = shape.element_count()?;
        if values.len() != element_count {
            return Err(Error::invalid_argument(format!(
                "expected {element_count} value(s) for a literal with shape '{shape}' but got {}",
                values.len(),
            )));
        }
        let mut data = vec![0; values.len() * T::SIZE_IN_BYTES];
        data.chunks_exact_mut(T::SIZE_IN_BYTES).zip(values).for_each(|(bytes, value)| value.write_bytes(bytes));
        Ok(Self { shape, data })
    }

    /// Creates a new scalar [`Literal`] that contains `value`.
    pub fn scalar<T: NativeType>(value: T) -> Self {
        let mut data = vec![0; T::SIZE_IN_BYTES];
        value.write_bytes(&mut data);
        Self { shape: Shape::scalar(T::BUFFER_TYPE), data }
    }

    /// [`Shape`] of this [`Literal`].
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of bytes that the elements of this [`Literal`] occupy.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Raw bytes of the elements of this [`Literal`].
    pub fn untyped_data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes of the elements of this [`Literal`]. The length of the returned slice is always
    /// [`Literal::size_in_bytes`], which is what population callbacks rely on.
    pub fn untyped_data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes this [`Literal`], returning its [`Shape`] and its raw bytes.
    pub fn into_parts(self) -> (Shape, Vec<u8>) {
        (self.shape, self.data)
    }

    /// Copies the elements of this [`Literal`] into a [`Vec`] of `T` values. `T` must match the element type of
    /// this [`Literal`].
    pub fn to_vec<T: NativeType>(&self) -> Result<Vec<T>, Error> {
        if self.shape.element_type() != T::BUFFER_TYPE {
            return Err(Error::invalid_argument(format!(
                "cannot read a literal with shape '{}' as '{}' values",
                self.shape,
                T::BUFFER_TYPE,
            )));
        }
        Ok(self.data.chunks_exact(T::SIZE_IN_BYTES).map(T::read_bytes).collect())
    }
}

impl Debug for Literal {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Literal[{}; {} byte(s)]", self.shape, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use half::{bf16, f16};

    use crate::{BufferType, Error, Literal, Shape};

    #[test]
    fn test_literal_new() {
        let literal = Literal::new(Shape::new(BufferType::F32, [2, 3])).unwrap();
        assert_eq!(literal.size_in_bytes(), 24);
        assert!(literal.untyped_data().iter().all(|byte| *byte == 0));
        assert_eq!(literal.to_vec::<f32>(), Ok(vec![0.0; 6]));
        assert_eq!(format!("{literal:?}"), "Literal[f32[2,3]; 24 byte(s)]");
        assert!(matches!(Literal::new(Shape::scalar(BufferType::Invalid)), Err(Error::InvalidArgument { .. })));
        assert!(matches!(Literal::new(Shape::new(BufferType::F32, [u64::MAX, 4])), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_literal_from_values() {
        let literal = Literal::from_values([2, 2], &[1i32, -2, 3, -4]).unwrap();
        assert_eq!(literal.shape(), &Shape::new(BufferType::I32, [2, 2]));
        assert_eq!(literal.to_vec::<i32>(), Ok(vec![1, -2, 3, -4]));
        assert!(matches!(literal.to_vec::<u32>(), Err(Error::InvalidArgument { .. })));
        assert!(matches!(
            Literal::from_values([3], &[1u8, 2]),
            Err(Error::InvalidArgument { message, .. })
                if message == "expected 3 value(s) for a literal with shape 'u8[3]' but got 2",
        ));
        assert!(matches!(Literal::from_values([u64::MAX, 2], &[1u8, 2]), Err(Error::OutOfRange { .. })));

        let values = [bf16::from_f32(1.5), bf16::from_f32(-0.25)];
        assert_eq!(Literal::from_values([2], &values).unwrap().to_vec::<bf16>(), Ok(values.to_vec()));
        let values = [f16::from_f32(2.0), f16::from_f32(0.5), f16::from_f32(-8.0)];
        assert_eq!(Literal::from_values([3], &values).unwrap().to_vec::<f16>(), Ok(values.to_vec()));
        let values = [true, false, true];
        assert_eq!(Literal::from_values([3], &values).unwrap().untyped_data(), &[1, 0, 1]);
    }

    #[test]
    fn test_literal_scalar_and_bytes() {
        let literal = Literal::scalar(42u64);
        assert_eq!(literal.shape(), &Shape::scalar(BufferType::U64));
        assert_eq!(literal.to_vec::<u64>(), Ok(vec![42]));

        let bytes = 7.25f64.to_ne_bytes().to_vec();
        let literal = Literal::from_bytes(Shape::scalar(BufferType::F64), bytes.clone()).unwrap();
        assert_eq!(literal.to_vec::<f64>(), Ok(vec![7.25]));
        let (shape, data) = literal.into_parts();
        assert_eq!(shape, Shape::scalar(BufferType::F64));
        assert_eq!(data, bytes);
        assert!(matches!(
            Literal::from_bytes(Shape::new(BufferType::I16, [4]), vec![0; 7]),
            Err(Error::InvalidArgument { .. }),
        ));
    }
}
