mod producer_test;
