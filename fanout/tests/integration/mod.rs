mod fan_out_test;
mod shutdown_test;
