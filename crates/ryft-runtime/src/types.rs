use std::fmt::{Debug, Display};

use crate::Error;

/// Type of the data stored in a [`RuntimeBuffer`](crate::RuntimeBuffer) or a [`Literal`](crate::Literal).
/// Specifically, this represents the type of individual values that are stored in those containers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferType {
    /// Invalid [`BufferType`] that serves as a default.
    Invalid,

    /// [`BufferType`] that represents token values that are threaded between side-effecting operations.
    /// Tokens carry no data and so values of this type occupy no memory.
    Token,

    /// Predicate [`BufferType`] that represents the `true` and `false` values, stored as one byte per value.
    Predicate,

    /// [`BufferType`] that represents signed 8-bit integer values.
    I8,

    /// [`BufferType`] that represents signed 16-bit integer values.
    I16,

    /// [`BufferType`] that represents signed 32-bit integer values.
    I32,

    /// [`BufferType`] that represents signed 64-bit integer values.
    I64,

    /// [`BufferType`] that represents unsigned 8-bit integer values.
    U8,

    /// [`BufferType`] that represents unsigned 16-bit integer values.
    U16,

    /// [`BufferType`] that represents unsigned 32-bit integer values.
    U32,

    /// [`BufferType`] that represents unsigned 64-bit integer values.
    U64,

    /// [`BufferType`] that represents 16-bit floating-point values with 8 exponent bits, 7 mantissa bits, and 1 sign
    /// bit. This type offers a larger dynamic range than [`BufferType::F16`] at the cost of lower precision.
    BF16,

    /// [`BufferType`] that represents 16-bit floating-point values with 5 exponent bits, 10 mantissa bits, and 1 sign
    /// bit, using the standard IEEE floating-point representation.
    F16,

    /// [`BufferType`] that represents 32-bit floating-point values using the standard IEEE representation.
    F32,

    /// [`BufferType`] that represents 64-bit floating-point values using the standard IEEE representation.
    F64,

    /// [`BufferType`] that represents 64-bit complex-valued floating-point values as pairs of
    /// 32-bit real floating-point values.
    C64,

    /// [`BufferType`] that represents 128-bit complex-valued floating-point values as pairs of
    /// 64-bit real floating-point values.
    C128,
}

impl BufferType {
    /// Parses a rendered [`BufferType`] (e.g., an XLA primitive type string like `"s32"`) into a [`BufferType`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(value: S) -> Result<Self, Error> {
        let value = value.as_ref();
        match value.trim().to_ascii_lowercase().as_str() {
            "invalid" => Ok(Self::Invalid),
            "token" => Ok(Self::Token),
            "pred" => Ok(Self::Predicate),
            "s8" | "i8" => Ok(Self::I8),
            "s16" | "i16" => Ok(Self::I16),
            "s32" | "i32" => Ok(Self::I32),
            "s64" | "i64" => Ok(Self::I64),
            "u8" => Ok(Self::U8),
            "u16" => Ok(Self::U16),
            "u32" => Ok(Self::U32),
            "u64" => Ok(Self::U64),
            "bf16" => Ok(Self::BF16),
            "f16" => Ok(Self::F16),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            "c64" => Ok(Self::C64),
            "c128" => Ok(Self::C128),
            _ => Err(Error::invalid_argument(format!("invalid buffer type '{value}'"))),
        }
    }

    /// Number of bytes that a single value of this [`BufferType`] occupies in host memory,
    /// or [`None`] for [`BufferType::Invalid`].
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            Self::Invalid => None,
            Self::Token => Some(0),
            Self::Predicate | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 | Self::BF16 | Self::F16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 | Self::C64 => Some(8),
            Self::C128 => Some(16),
        }
    }
}

impl Display for BufferType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Invalid => "invalid",
            Self::Token => "token",
            Self::Predicate => "pred",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::BF16 => "bf16",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::C64 => "c64",
            Self::C128 => "c128",
        })
    }
}

/// Shape of a dense array: its [`BufferType`] together with the size of each of its dimensions. Shapes with no
/// dimensions represent scalars. Layouts are not tracked here; native runtimes pick their own default layouts
/// and [`Literal`](crate::Literal)s always use the dense row-major layout.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    element_type: BufferType,
    dimensions: Vec<u64>,
}

impl Shape {
    /// Creates a new [`Shape`] with the provided element type and dimension sizes.
    pub fn new<D: Into<Vec<u64>>>(element_type: BufferType, dimensions: D) -> Self {
        Self { element_type, dimensions: dimensions.into() }
    }

    /// Creates a new scalar [`Shape`] (i.e., a shape with no dimensions).
    pub fn scalar(element_type: BufferType) -> Self {
        Self { element_type, dimensions: Vec::new() }
    }

    /// Parses a rendered [`Shape`] like `"f32[2,3]"` or `"pred[]"`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(value: S) -> Result<Self, Error> {
        let value = value.as_ref().trim();
        let invalid = || Error::invalid_argument(format!("invalid shape '{value}'"));
        let (element_type, rest) = value.split_once('[').ok_or_else(invalid)?;
        let dimensions = rest.strip_suffix(']').ok_or_else(invalid)?;
        let element_type = BufferType::from_str(element_type)?;
        let dimensions = if dimensions.trim().is_empty() {
            Vec::new()
        } else {
            dimensions
                .split(',')
                .map(|dimension| dimension.trim().parse::<u64>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self { element_type, dimensions })
    }

    /// [`BufferType`] of the elements of arrays with this [`Shape`].
    pub fn element_type(&self) -> BufferType {
        self.element_type
    }

    /// Sizes of the dimensions of this [`Shape`], from the most major to the most minor dimension.
    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    /// Number of dimensions of this [`Shape`].
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Total number of elements in arrays with this [`Shape`]. Returns an [`Error::OutOfRange`] if that number does
    /// not fit in a [`usize`].
    pub fn element_count(&self) -> Result<usize, Error> {
        self.dimensions
            .iter()
            .try_fold(1usize, |count, dimension| count.checked_mul(usize::try_from(*dimension).ok()?))
            .ok_or_else(|| Error::out_of_range(format!("the number of elements of shape '{self}' overflows")))
    }

    /// Number of bytes needed to store an array with this [`Shape`] in host memory using a dense layout.
    pub fn size_in_bytes(&self) -> Result<usize, Error> {
        let element_size = self
            .element_type
            .size_in_bytes()
            .ok_or_else(|| Error::invalid_argument(format!("shape '{self}' has an invalid element type")))?;
        self.element_count()?
            .checked_mul(element_size)
            .ok_or_else(|| Error::out_of_range(format!("the size of shape '{self}' overflows")))
    }
}

// Our [`Display`] implementation attempts to match the corresponding XLA rendering (modulo layouts).
impl Display for Shape {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}[", self.element_type)?;
        for (index, dimension) in self.dimensions.iter().enumerate() {
            if index > 0 {
                write!(formatter, ",")?;
            }
            write!(formatter, "{dimension}")?;
        }
        write!(formatter, "]")
    }
}

impl Debug for Shape {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Shape[{self}]")
    }
}

/// Signature of a compiled program: the [`Shape`]s of its parameters and of its results.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramShape {
    /// [`Shape`]s of the program parameters, in order.
    pub parameters: Vec<Shape>,

    /// [`Shape`]s of the program results, in order. Programs with a tuple result list each tuple element here.
    pub results: Vec<Shape>,
}

impl ProgramShape {
    /// Creates a new [`ProgramShape`].
    pub fn new(parameters: Vec<Shape>, results: Vec<Shape>) -> Self {
        Self { parameters, results }
    }
}

impl Display for ProgramShape {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let render = |shapes: &[Shape]| shapes.iter().map(|shape| shape.to_string()).collect::<Vec<_>>().join(", ");
        write!(formatter, "({}) -> ({})", render(&self.parameters), render(&self.results))
    }
}

impl Debug for ProgramShape {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "ProgramShape[{self}]")
    }
}
