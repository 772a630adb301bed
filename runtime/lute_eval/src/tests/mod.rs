mod errors;
mod exec;
mod hosting;
mod support;
