mod extraction;
mod keepalive;
