mod adagrad;
mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod update_rule;

pub use adagrad::AdaGrad;
pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use update_rule::UpdateRule;
