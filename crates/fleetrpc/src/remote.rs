//! # Typed Signatures
//!
//! Derives method descriptors from Rust types, so callers can describe a remote
//! method as `MethodType::of::<(i32, String), f64>()` instead of spelling `(IT)D`.
//!
//! | Rust                     | Descriptor |
//! |--------------------------|------------|
//! | `bool` … `char`          | `Z B S I J F D C` |
//! | `String`                 | `T` |
//! | `BTreeMap<String, Value>`| `R` |
//! | `Vec<T>`                 | `[` + `T` |
//! | `Option<T>`              | `?T` for primitives, else `T` |
//!
//! Object types have no Rust counterpart here; a marker type implements
//! `RemoteType` by hand and returns `TypeDesc::object(name)`.

use std::collections::BTreeMap;

use crate::descriptor::MethodType;
use crate::descriptor::TypeDesc;
use crate::value::Value;

/// A Rust type with a fixed wire descriptor.
pub trait RemoteType {
    fn type_desc() -> TypeDesc;
}

macro_rules! remote_types {
    ($($ty:ty => $desc:ident;)*) => {
        $(
            impl RemoteType for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::$desc
                }
            }
        )*
    };
}

remote_types! {
    bool => Bool;
    i8 => Byte;
    i16 => Short;
    i32 => Int;
    i64 => Long;
    f32 => Float;
    f64 => Double;
    char => Char;
    String => String;
    BTreeMap<String, Value> => Record;
}

impl<T: RemoteType> RemoteType for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::list(T::type_desc())
    }
}

impl<T: RemoteType> RemoteType for Option<T> {
    fn type_desc() -> TypeDesc {
        // Reference types already accept null.
        match T::type_desc() {
            inner if inner.is_primitive() => TypeDesc::nullable(inner),
            inner => inner,
        }
    }
}

/// A method's return type; `()` is void.
pub trait RemoteReturn {
    fn return_type() -> Option<TypeDesc>;
}

impl<T: RemoteType> RemoteReturn for T {
    fn return_type() -> Option<TypeDesc> {
        Some(T::type_desc())
    }
}

impl RemoteReturn for () {
    fn return_type() -> Option<TypeDesc> {
        None
    }
}

/// A tuple of arguments whose element types give the parameter list.
pub trait RemoteArgs {
    fn param_types() -> Vec<TypeDesc>;

    fn into_values(self) -> Vec<Value>;
}

macro_rules! remote_args {
    ($($name:ident),*) => {
        impl<$($name),*> RemoteArgs for ($($name,)*)
        where
            $($name: RemoteType + Into<Value>,)*
        {
            fn param_types() -> Vec<TypeDesc> {
                vec![$($name::type_desc()),*]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)*) = self;
                vec![$($name.into()),*]
            }
        }
    };
}

remote_args!();
remote_args!(A);
remote_args!(A, B);
remote_args!(A, B, C);
remote_args!(A, B, C, D);
remote_args!(A, B, C, D, E);
remote_args!(A, B, C, D, E, F);
remote_args!(A, B, C, D, E, F, G);
remote_args!(A, B, C, D, E, F, G, H);

impl MethodType {
    /// The descriptor of a method taking `A` and returning `R`.
    pub fn of<A: RemoteArgs, R: RemoteReturn>() -> Self {
        Self { params: A::param_types(), ret: R::return_type() }
    }
}
