use std::fmt;

/// Type of a declared name or of an evaluated expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeValue {
    Integer,
    Boolean,
    Char,
    /// Element is always one of the scalar types.
    Array { element: Box<TypeValue>, size: usize },
    Procedure { params: Vec<TypeValue> },
}

impl TypeValue {
    pub fn array(element: TypeValue, size: usize) -> Self {
        debug_assert!(element.is_scalar(), "array elements are scalar");
        TypeValue::Array {
            element: Box::new(element),
            size,
        }
    }

    /// A procedure with no parameters yet; see `SymbolTable::add_parameter_type`.
    pub fn procedure() -> Self {
        TypeValue::Procedure { params: Vec::new() }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeValue::Integer | TypeValue::Boolean | TypeValue::Char)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeValue::Array { .. })
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, TypeValue::Procedure { .. })
    }

    /// Number of words reserved for a variable of this type.
    pub fn storage_words(&self) -> usize {
        match self {
            TypeValue::Array { size, .. } => *size,
            _ => 1,
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeValue::Integer => write!(f, "integer"),
            TypeValue::Boolean => write!(f, "boolean"),
            TypeValue::Char => write!(f, "char"),
            TypeValue::Array { element, size } => write!(f, "array[{size}]of{element}"),
            TypeValue::Procedure { params } => {
                write!(f, "procedure(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Can a value of type `source` be stored into (or passed as) `target`?
///
/// Scalars convert freely among themselves. Arrays only match an identical
/// array type, and procedures are never values.
pub fn compatible(target: &TypeValue, source: &TypeValue) -> bool {
    match (target, source) {
        (TypeValue::Procedure { .. }, _) | (_, TypeValue::Procedure { .. }) => false,
        (TypeValue::Array { .. }, TypeValue::Array { .. }) => target == source,
        (TypeValue::Array { .. }, _) | (_, TypeValue::Array { .. }) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_renders_canonical_names() {
        assert_eq!(TypeValue::Integer.describe(), "integer");
        assert_eq!(TypeValue::array(TypeValue::Char, 12).describe(), "array[12]ofchar");
        let proc_ty = TypeValue::Procedure {
            params: vec![TypeValue::Integer, TypeValue::array(TypeValue::Boolean, 3)],
        };
        assert_eq!(proc_ty.describe(), "procedure(integer,array[3]ofboolean)");
        assert_eq!(TypeValue::procedure().describe(), "procedure()");
    }

    #[test]
    fn scalars_are_interconvertible() {
        let scalars = [TypeValue::Integer, TypeValue::Boolean, TypeValue::Char];
        for target in &scalars {
            for source in &scalars {
                assert!(compatible(target, source), "{target} <- {source}");
            }
        }
    }

    #[test]
    fn arrays_only_match_identical_arrays() {
        let a10 = TypeValue::array(TypeValue::Integer, 10);
        assert!(compatible(&a10, &a10.clone()));
        assert!(!compatible(&a10, &TypeValue::array(TypeValue::Integer, 11)));
        assert!(!compatible(&a10, &TypeValue::array(TypeValue::Char, 10)));
        assert!(!compatible(&a10, &TypeValue::Integer));
        assert!(!compatible(&TypeValue::Integer, &a10));
    }

    #[test]
    fn procedures_are_never_compatible() {
        let p = TypeValue::procedure();
        assert!(!compatible(&p, &p.clone()));
        assert!(!compatible(&TypeValue::Integer, &p));
        assert!(!compatible(&p, &TypeValue::Boolean));
    }
}
