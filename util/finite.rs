/*!
Numeric outcomes are keys of distributions, so they need a total order and a hash. `Finite` wraps an `f64` that is known to be neither infinite nor `NaN`, which gives it both.

```
use localml_util::finite::Finite;

let point = Finite::new(1.5).unwrap();
assert_eq!(point.get(), 1.5);
assert!(Finite::new(point.get() / 0.0).is_err());
```
*/

use std::{
	cmp::Ordering,
	hash::{Hash, Hasher},
};
use thiserror::Error;

#[derive(Clone, Copy, Debug)]
pub struct Finite(f64);

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("{0} is not a finite number")]
pub struct NotFiniteError(pub f64);

impl Finite {
	pub fn new(value: f64) -> Result<Finite, NotFiniteError> {
		if value.is_finite() {
			Ok(Finite(value))
		} else {
			Err(NotFiniteError(value))
		}
	}

	pub fn get(self) -> f64 {
		self.0
	}
}

impl std::fmt::Display for Finite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl PartialEq for Finite {
	fn eq(&self, other: &Finite) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Finite {}

impl PartialOrd for Finite {
	fn partial_cmp(&self, other: &Finite) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Finite {
	fn cmp(&self, other: &Finite) -> Ordering {
		self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
	}
}

impl Hash for Finite {
	fn hash<H: Hasher>(&self, state: &mut H) {
		// -0.0 equals 0.0.
		let value = if self.0 == 0.0 { 0.0f64 } else { self.0 };
		value.to_bits().hash(state);
	}
}

#[test]
fn test_finite() {
	let mut points = [2.5, -1.0, 0.0]
		.iter()
		.map(|point| Finite::new(*point).unwrap())
		.collect::<Vec<_>>();
	points.sort();
	let points = points.into_iter().map(Finite::get).collect::<Vec<_>>();
	assert_eq!(points, vec![-1.0, 0.0, 2.5]);
	assert_eq!(Finite::new(-0.0).unwrap(), Finite::new(0.0).unwrap());
	assert_eq!(
		Finite::new(std::f64::NAN).map_err(|error| error.to_string().contains("not a finite")),
		Err(true)
	);
	assert!(Finite::new(std::f64::INFINITY).is_err());
}
