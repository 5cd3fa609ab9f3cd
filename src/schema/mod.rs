pub mod decision;
pub mod ids;
pub mod inject;
pub mod module;
pub mod question;
pub mod scenario;
