pub mod analysis;
pub mod enums;
pub mod outcome;
pub mod records;
pub mod shapes;

pub use analysis::*;
pub use enums::*;
pub use outcome::*;
pub use records::*;
pub use shapes::*;
