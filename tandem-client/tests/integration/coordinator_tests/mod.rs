mod test_caller_flow;
mod test_hangup;
