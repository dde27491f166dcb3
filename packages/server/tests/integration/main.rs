mod auth;
mod common;
mod files;
mod social;
