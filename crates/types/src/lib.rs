use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int64,
    Double,
    Text,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Int64 => write!(f, "INT64"),
            SqlType::Double => write!(f, "DOUBLE"),
            SqlType::Text => write!(f, "TEXT"),
        }
    }
}

/// A value of one of the three column types. There is no NULL variant:
/// every column is populated on insert.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Int(_) => SqlType::Int64,
            Value::Double(_) => SqlType::Double,
            Value::Text(_) => SqlType::Text,
        }
    }

    pub fn is_type(&self, ty: SqlType) -> bool {
        self.sql_type() == ty
    }

    /// Compares two values of the same type. Returns `None` across types.
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => Some(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|o| o == Ordering::Equal)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_same_type(other) == Some(Ordering::Equal)
    }
}
impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.cmp_same_type(other)
    }
}

/// Keys stored in the ordered index store must have a total order across
/// a single column's values, which `cmp_same_type` already provides for
/// well-formed rows (every value in a column shares the column's type).
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_same_type(other)
            .unwrap_or_else(|| type_rank(self).cmp(&type_rank(other)))
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Int(_) => 0,
        Value::Double(_) => 1,
        Value::Text(_) => 2,
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Value::Double(d) => {
                1u8.hash(state);
                d.to_bits().hash(state);
            }
            Value::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn comparisons_require_same_type() {
        assert_eq!(
            Value::Text("a".into()).cmp_same_type(&Value::Text("a".into())),
            Some(Equal)
        );
        assert_eq!(
            Value::Double(2.0).cmp_same_type(&Value::Double(1.0)),
            Some(Greater)
        );
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(2)), Some(false));
        assert_eq!(Value::Text("1".into()).eq_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn serde_round_trip_stability() {
        let vals = vec![Value::Int(-42), Value::Double(3.25), Value::Text("Ada".into())];
        let json = serde_json::to_string(&vals).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(vals, back);
    }

    #[test]
    fn total_ord_across_types_is_stable_not_comparable() {
        // cross-type Ord is only used to give Vec<Value> keys a total order
        // inside the btree; it is never exposed to SQL-level comparisons.
        assert_ne!(Value::Int(1).cmp(&Value::Text("1".into())), Equal);
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(i in any::<i64>(), j in any::<i64>()) {
            let a = Value::Int(i);
            let b = Value::Int(j);
            let ord1 = a.cmp_same_type(&b);
            let ord2 = b.cmp_same_type(&a);
            match (ord1, ord2) {
                (Some(o1), Some(o2)) => assert_eq!(o1, o2.reverse()),
                _ => prop_assert!(true),
            }
        }

        #[test]
        fn eq_reflexive(val in any::<i64>()) {
            let v = Value::Int(val);
            assert_eq!(v.eq_same_type(&v), Some(true));
        }

        #[test]
        fn text_cmp_matches_std(a in ".*", b in ".*") {
            let va = Value::Text(a.clone());
            let vb = Value::Text(b.clone());
            assert_eq!(va.cmp_same_type(&vb), Some(a.cmp(&b)));
        }
    }
}
