mod config_test;
mod crud_test;
mod middleware_test;
