pub mod stream_server;
