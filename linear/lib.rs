/*!
This crate evaluates logistic regression models. A model with a single set of coefficients predicts the probability of its first class with the sigmoid function. A model with one set of coefficients per class combines the class logits with the `softmax` function.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod logistic_regression;

pub use self::logistic_regression::{
	FeatureGroup, LogisticRegression, LogisticRegressionPrediction, NumericFeatureGroup,
	NumericMissing, TermsFeatureGroup,
};
